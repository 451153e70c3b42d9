//! Volume data source
//!
//! The name, size and state filters go to the server; the lookup then
//! insists on exactly one result.

use crate::api::volumes::{ListVolumesInput, Volume};
use crate::provider_data::TritonProviderData;
use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse, ValidateDataSourceConfigRequest, ValidateDataSourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

#[derive(Default)]
pub struct VolumeDataSource {
    provider_data: Option<TritonProviderData>,
}

impl VolumeDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn data_source_schema() -> Schema {
        SchemaBuilder::new()
            .version(1)
            .description("Looks up a single NFS volume")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("Volume UUID")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Volume name to filter on")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("size", AttributeType::Number)
                    .description("Size in MiB to filter on")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("state", AttributeType::String)
                    .description("Volume state to filter on")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("type", AttributeType::String)
                    .description("Type of the volume")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("filesystem_path", AttributeType::String)
                    .description("NFS path the volume is mounted from")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("networks", AttributeType::List(Box::new(AttributeType::String)))
                    .description("Fabric networks the volume is reachable on")
                    .computed()
                    .build(),
            )
            .build()
    }

    fn volume_to_state(volume: &Volume) -> DynamicValue {
        let mut state = DynamicValue::empty_object();
        let _ = state.set_string(&AttributePath::new("id"), volume.id.clone());
        let _ = state.set_string(&AttributePath::new("name"), volume.name.clone());
        let _ = state.set_number(&AttributePath::new("size"), volume.size as f64);
        let _ = state.set_string(&AttributePath::new("state"), volume.state.clone());
        let _ = state.set_string(&AttributePath::new("type"), volume.type_.clone());
        let _ = state.set_string(
            &AttributePath::new("filesystem_path"),
            volume.filesystem_path.clone(),
        );
        let _ = state.set_list(
            &AttributePath::new("networks"),
            volume
                .networks
                .iter()
                .map(|n| Dynamic::String(n.clone()))
                .collect(),
        );
        state
    }
}

#[async_trait]
impl DataSource for VolumeDataSource {
    fn type_name(&self) -> &str {
        "triton_volume"
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

        let input = ListVolumesInput {
            name: request
                .config
                .get_string_opt(&AttributePath::new("name"))
                .unwrap_or(None),
            size: request
                .config
                .get_number_opt(&AttributePath::new("size"))
                .unwrap_or(None)
                .map(|n| n as i64),
            state: request
                .config
                .get_string_opt(&AttributePath::new("state"))
                .unwrap_or(None),
        };

        let volumes = match provider_data.client.volumes().list(&input).await {
            Ok(volumes) => volumes,
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to list volumes",
                    format!("API error: {}", e),
                ));
                return ReadDataSourceResponse { state, diagnostics };
            }
        };

        match volumes.as_slice() {
            [] => {
                diagnostics.push(Diagnostic::error(
                    "No matching volume",
                    "Your query returned no results. Please change your search criteria and try again.",
                ));
                ReadDataSourceResponse { state, diagnostics }
            }
            [volume] => ReadDataSourceResponse {
                state: Self::volume_to_state(volume),
                diagnostics,
            },
            candidates => {
                let names: Vec<&str> = candidates.iter().map(|v| v.name.as_str()).collect();
                diagnostics.push(Diagnostic::error(
                    "Ambiguous volume query",
                    format!(
                        "Your query returned more than one result: {}. Please try a more specific search criteria.",
                        names.join(", ")
                    ),
                ));
                ReadDataSourceResponse { state, diagnostics }
            }
        }
    }
}

#[async_trait]
impl DataSourceWithConfigure for VolumeDataSource {
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

    fn test_data_source(server_url: &str) -> VolumeDataSource {
        let client = Client::new(server_url, "demo", "aa:bb", false).unwrap();
        VolumeDataSource {
            provider_data: Some(TritonProviderData::new(client)),
        }
    }

    #[tokio::test]
    async fn single_match_populates_state() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock(
                "GET",
                mockito::Matcher::Regex(r"^/demo/volumes".to_string()),
            )
            .with_status(200)
            .with_body(
                r#"[{"id": "vol-1", "name": "data", "type": "tritonnfs",
                     "size": 10240, "state": "ready",
                     "filesystem_path": "nfs.example:/exports/data",
                     "networks": ["net-1"]}]"#,
            )
            .create_async()
            .await;

        let data_source = test_data_source(&server.url());

        let mut config = DynamicValue::empty_object();
        config
            .set_string(&AttributePath::new("name"), "data".to_string())
            .unwrap();

        let response = data_source
            .read(
                Context::new(),
                ReadDataSourceRequest {
                    type_name: "triton_volume".to_string(),
                    config,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
        assert_eq!(
            response.state.get_string(&AttributePath::new("id")).unwrap(),
            "vol-1"
        );
    }

    #[tokio::test]
    async fn no_match_errors() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock(
                "GET",
                mockito::Matcher::Regex(r"^/demo/volumes".to_string()),
            )
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let data_source = test_data_source(&server.url());

        let response = data_source
            .read(
                Context::new(),
                ReadDataSourceRequest {
                    type_name: "triton_volume".to_string(),
                    config: DynamicValue::empty_object(),
                },
            )
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert!(response.diagnostics[0].detail.contains("no results"));
    }
}
