//! Fabric VLAN data source
//!
//! Name and description filters accept `*` and `?` wildcards; the VLAN
//! id filter is exact. At least one filter must be set.

use crate::api::network::FabricVlan;
use crate::provider_data::TritonProviderData;
use crate::wildcard::wildcard_match;
use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse, ValidateDataSourceConfigRequest, ValidateDataSourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};

#[derive(Debug, Default)]
struct VlanFilter {
    vlan_id: Option<i64>,
    name: Option<String>,
    description: Option<String>,
}

impl VlanFilter {
    fn is_empty(&self) -> bool {
        self.vlan_id.is_none() && self.name.is_none() && self.description.is_none()
    }

    fn matches(&self, vlan: &FabricVlan) -> bool {
        if let Some(vlan_id) = self.vlan_id {
            if vlan.vlan_id != vlan_id {
                return false;
            }
        }
        if let Some(name) = &self.name {
            if !wildcard_match(name, &vlan.name) {
                return false;
            }
        }
        if let Some(description) = &self.description {
            if !wildcard_match(description, &vlan.description) {
                return false;
            }
        }
        true
    }
}

#[derive(Default)]
pub struct FabricVlanDataSource {
    provider_data: Option<TritonProviderData>,
}

impl FabricVlanDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn data_source_schema() -> Schema {
        SchemaBuilder::new()
            .version(1)
            .description("Looks up a single fabric VLAN")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("VLAN id as a string")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("vlan_id", AttributeType::Number)
                    .description("Exact VLAN id to filter on")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Name to filter on; supports * and ? wildcards")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("description", AttributeType::String)
                    .description("Description to filter on; supports * and ? wildcards")
                    .optional()
                    .computed()
                    .build(),
            )
            .build()
    }

    fn extract_filter(config: &DynamicValue) -> Result<VlanFilter, Diagnostic> {
        Ok(VlanFilter {
            vlan_id: config
                .get_number_opt(&AttributePath::new("vlan_id"))
                .map_err(|e| Diagnostic::error("Invalid vlan_id", e.to_string()))?
                .map(|n| n as i64),
            name: config
                .get_string_opt(&AttributePath::new("name"))
                .map_err(|e| Diagnostic::error("Invalid name", e.to_string()))?,
            description: config
                .get_string_opt(&AttributePath::new("description"))
                .map_err(|e| Diagnostic::error("Invalid description", e.to_string()))?,
        })
    }

    fn vlan_to_state(vlan: &FabricVlan) -> DynamicValue {
        let mut state = DynamicValue::empty_object();
        let _ = state.set_string(&AttributePath::new("id"), vlan.vlan_id.to_string());
        let _ = state.set_number(&AttributePath::new("vlan_id"), vlan.vlan_id as f64);
        let _ = state.set_string(&AttributePath::new("name"), vlan.name.clone());
        let _ = state.set_string(&AttributePath::new("description"), vlan.description.clone());
        state
    }
}

#[async_trait]
impl DataSource for FabricVlanDataSource {
    fn type_name(&self) -> &str {
        "triton_fabric_vlan"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        DataSourceSchemaResponse {
            schema: Self::data_source_schema(),
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateDataSourceConfigRequest,
    ) -> ValidateDataSourceConfigResponse {
        ValidateDataSourceConfigResponse {
            diagnostics: Self::data_source_schema().validate_config(&request.config),
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let mut diagnostics = vec![];
        let state = DynamicValue::empty_object();

        let provider_data = match &self.provider_data {
            Some(data) => data,
            None => {
                diagnostics.push(Diagnostic::error(
                    "Provider not configured",
                    "Provider data was not properly configured",
                ));
                return ReadDataSourceResponse { state, diagnostics };
            }
        };

        let filter = match Self::extract_filter(&request.config) {
            Ok(filter) => filter,
            Err(diag) => {
                diagnostics.push(diag);
                return ReadDataSourceResponse { state, diagnostics };
            }
        };
        if filter.is_empty() {
            diagnostics.push(Diagnostic::error(
                "Missing search criteria",
                "At least one of 'vlan_id', 'name' or 'description' must be set",
            ));
            return ReadDataSourceResponse { state, diagnostics };
        }

        let vlans = match provider_data.client.network().list_vlans().await {
            Ok(vlans) => vlans,
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to list fabric VLANs",
                    format!("API error: {}", e),
                ));
                return ReadDataSourceResponse { state, diagnostics };
            }
        };

        let matches: Vec<&FabricVlan> = vlans.iter().filter(|v| filter.matches(v)).collect();
        match matches.as_slice() {
            [] => {
                diagnostics.push(Diagnostic::error(
                    "No matching fabric VLAN",
                    "Your query returned no results. Please change your search criteria and try again.",
                ));
                ReadDataSourceResponse { state, diagnostics }
            }
            [vlan] => ReadDataSourceResponse {
                state: Self::vlan_to_state(vlan),
                diagnostics,
            },
            _ => {
                diagnostics.push(Diagnostic::error(
                    "Ambiguous fabric VLAN query",
                    "Your query returned more than one result. Please try a more specific search criteria.",
                ));
                ReadDataSourceResponse { state, diagnostics }
            }
        }
    }
}

#[async_trait]
impl DataSourceWithConfigure for FabricVlanDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        let mut diagnostics = vec![];

        if let Some(data) = request.provider_data {
            if let Some(provider_data) = data.downcast_ref::<TritonProviderData>() {
                self.provider_data = Some(provider_data.clone());
            } else {
                diagnostics.push(Diagnostic::error(
                    "Invalid provider data",
                    "Failed to extract TritonProviderData from provider data",
                ));
            }
        } else {
            diagnostics.push(Diagnostic::error(
                "No provider data",
                "No provider data was provided to the data source",
            ));
        }

        ConfigureDataSourceResponse { diagnostics }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Client;

    fn vlan(vlan_id: i64, name: &str, description: &str) -> FabricVlan {
        serde_json::from_value(serde_json::json!({
            "vlan_id": vlan_id,
            "name": name,
            "description": description,
        }))
        .unwrap()
    }

    #[test]
    fn name_filter_accepts_wildcards() {
        let filter = VlanFilter {
            name: Some("backend-*".to_string()),
            ..Default::default()
        };

        assert!(filter.matches(&vlan(2, "backend-prod", "")));
        assert!(!filter.matches(&vlan(3, "frontend-prod", "")));
    }

    #[tokio::test]
    async fn read_without_filters_errors() {
        let client = Client::new("https://triton.test", "demo", "aa:bb", false).unwrap();
        let data_source = FabricVlanDataSource {
            provider_data: Some(TritonProviderData::new(client)),
        };

        let response = data_source
            .read(
                Context::new(),
                ReadDataSourceRequest {
                    type_name: "triton_fabric_vlan".to_string(),
                    config: DynamicValue::empty_object(),
                },
            )
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert!(response.diagnostics[0]
            .summary
            .contains("Missing search criteria"));
    }

    #[tokio::test]
    async fn read_by_vlan_id_finds_single_match() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/demo/fabrics/default/vlans")
            .with_status(200)
            .with_body(
                r#"[{"vlan_id": 2, "name": "backend", "description": "db tier"},
                    {"vlan_id": 3, "name": "frontend", "description": "web tier"}]"#,
            )
            .create_async()
            .await;

        let client = Client::new(&server.url(), "demo", "aa:bb", false).unwrap();
        let data_source = FabricVlanDataSource {
            provider_data: Some(TritonProviderData::new(client)),
        };

        let mut config = DynamicValue::empty_object();
        config
            .set_number(&AttributePath::new("vlan_id"), 2.0)
            .unwrap();

        let response = data_source
            .read(
                Context::new(),
                ReadDataSourceRequest {
                    type_name: "triton_fabric_vlan".to_string(),
                    config,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
        assert_eq!(
            response
                .state
                .get_string(&AttributePath::new("name"))
                .unwrap(),
            "backend"
        );
    }
}
