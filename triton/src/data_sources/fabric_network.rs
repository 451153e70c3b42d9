//! Fabric network data source
//!
//! Looks a fabric network up by name within one VLAN.

use crate::api::network::Network;
use crate::provider_data::TritonProviderData;
use async_trait::async_trait;
use std::collections::HashMap;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse, ValidateDataSourceConfigRequest, ValidateDataSourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

#[derive(Default)]
pub struct FabricNetworkDataSource {
    provider_data: Option<TritonProviderData>,
}

impl FabricNetworkDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn data_source_schema() -> Schema {
        SchemaBuilder::new()
            .version(1)
            .description("Looks up a fabric network by name within a VLAN")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("Network UUID")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Exact name of the fabric network")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("vlan_id", AttributeType::Number)
                    .description("VLAN the network lives on")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("public", AttributeType::Bool)
                    .description("Whether the network is routed to the internet")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("fabric", AttributeType::Bool)
                    .description("Always true for fabric networks")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("subnet", AttributeType::String)
                    .description("CIDR the network covers")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("provision_start_ip", AttributeType::String)
                    .description("First assignable address")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("provision_end_ip", AttributeType::String)
                    .description("Last assignable address")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("gateway", AttributeType::String)
                    .description("Gateway address")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(
                    "resolvers",
                    AttributeType::List(Box::new(AttributeType::String)),
                )
                .description("DNS resolvers handed to instances")
                .computed()
                .build(),
            )
            .attribute(
                AttributeBuilder::new("routes", AttributeType::Map(Box::new(AttributeType::String)))
                    .description("Static routes, CIDR to gateway")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("internet_nat", AttributeType::Bool)
                    .description("Whether outbound NAT is provisioned")
                    .computed()
                    .build(),
            )
            .build()
    }

    fn network_to_state(vlan_id: i64, network: &Network) -> DynamicValue {
        let mut state = DynamicValue::empty_object();
        let _ = state.set_string(&AttributePath::new("id"), network.id.clone());
        let _ = state.set_string(&AttributePath::new("name"), network.name.clone());
        let _ = state.set_number(&AttributePath::new("vlan_id"), vlan_id as f64);
        let _ = state.set_bool(&AttributePath::new("public"), network.public);
        let _ = state.set_bool(&AttributePath::new("fabric"), network.fabric);
        let _ = state.set_string(&AttributePath::new("subnet"), network.subnet.clone());
        let _ = state.set_string(
            &AttributePath::new("provision_start_ip"),
            network.provision_start_ip.clone(),
        );
        let _ = state.set_string(
            &AttributePath::new("provision_end_ip"),
            network.provision_end_ip.clone(),
        );
        let _ = state.set_string(&AttributePath::new("gateway"), network.gateway.clone());
        let _ = state.set_list(
            &AttributePath::new("resolvers"),
            network
                .resolvers
                .iter()
                .map(|r| Dynamic::String(r.clone()))
                .collect(),
        );
        let routes: HashMap<String, Dynamic> = network
            .routes
            .iter()
            .map(|(k, v)| (k.clone(), Dynamic::String(v.clone())))
            .collect();
        let _ = state.set_map(&AttributePath::new("routes"), routes);
        let _ = state.set_bool(&AttributePath::new("internet_nat"), network.internet_nat);
        state
    }
}

#[async_trait]
impl DataSource for FabricNetworkDataSource {
    fn type_name(&self) -> &str {
        "triton_fabric_network"
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

        let name = match request.config.get_string(&AttributePath::new("name")) {
            Ok(name) => name,
            Err(_) => {
                diagnostics.push(Diagnostic::error(
                    "Missing name",
                    "The 'name' attribute is required",
                ));
                return ReadDataSourceResponse { state, diagnostics };
            }
        };
        let vlan_id = match request.config.get_number(&AttributePath::new("vlan_id")) {
            Ok(vlan_id) => vlan_id as i64,
            Err(_) => {
                diagnostics.push(Diagnostic::error(
                    "Missing vlan_id",
                    "The 'vlan_id' attribute is required",
                ));
                return ReadDataSourceResponse { state, diagnostics };
            }
        };

        let networks = match provider_data
            .client
            .network()
            .list_fabric_networks(vlan_id)
            .await
        {
            Ok(networks) => networks,
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to list fabric networks",
                    format!("API error: {}", e),
                ));
                return ReadDataSourceResponse { state, diagnostics };
            }
        };

        match networks.iter().find(|n| n.fabric && n.name == name) {
            Some(network) => ReadDataSourceResponse {
                state: Self::network_to_state(vlan_id, network),
                diagnostics,
            },
            None => {
                diagnostics.push(Diagnostic::error(
                    "Fabric network not found",
                    format!("No fabric network named '{}' on VLAN {}", name, vlan_id),
                ));
                ReadDataSourceResponse { state, diagnostics }
            }
        }
    }
}

#[async_trait]
impl DataSourceWithConfigure for FabricNetworkDataSource {
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

    #[tokio::test]
    async fn read_skips_non_fabric_networks() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/demo/fabrics/default/vlans/2/networks")
            .with_status(200)
            .with_body(
                r#"[{"id": "net-1", "name": "backend", "fabric": false},
                    {"id": "net-2", "name": "backend", "fabric": true,
                     "subnet": "10.50.1.0/24", "internet_nat": true}]"#,
            )
            .create_async()
            .await;

        let client = Client::new(&server.url(), "demo", "aa:bb", false).unwrap();
        let data_source = FabricNetworkDataSource {
            provider_data: Some(TritonProviderData::new(client)),
        };

        let mut config = DynamicValue::empty_object();
        config
            .set_string(&AttributePath::new("name"), "backend".to_string())
            .unwrap();
        config
            .set_number(&AttributePath::new("vlan_id"), 2.0)
            .unwrap();

        let response = data_source
            .read(
                Context::new(),
                ReadDataSourceRequest {
                    type_name: "triton_fabric_network".to_string(),
                    config,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
        assert_eq!(
            response.state.get_string(&AttributePath::new("id")).unwrap(),
            "net-2"
        );
        assert_eq!(
            response
                .state
                .get_string(&AttributePath::new("subnet"))
                .unwrap(),
            "10.50.1.0/24"
        );
    }
}
