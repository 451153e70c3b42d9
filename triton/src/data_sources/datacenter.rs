//! Datacenter data source
//!
//! CloudAPI has no "which datacenter am I" call, so the lookup matches
//! the configured endpoint against the datacenter listing. Some endpoint
//! URLs still use the legacy joyentcloud.com domain; both spellings are
//! treated as the same datacenter.

use crate::provider_data::TritonProviderData;
use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse, ValidateDataSourceConfigRequest, ValidateDataSourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};

fn normalize_endpoint(url: &str) -> String {
    url.trim_end_matches('/')
        .replace("joyentcloud.com", "joyent.com")
}

#[derive(Default)]
pub struct DatacenterDataSource {
    provider_data: Option<TritonProviderData>,
}

impl DatacenterDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn data_source_schema() -> Schema {
        SchemaBuilder::new()
            .version(1)
            .description("Looks up the datacenter the provider is pointed at")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("Datacenter name")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Datacenter name")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("endpoint", AttributeType::String)
                    .description("CloudAPI endpoint URL of the datacenter")
                    .computed()
                    .build(),
            )
            .build()
    }
}

#[async_trait]
impl DataSource for DatacenterDataSource {
    fn type_name(&self) -> &str {
        "triton_datacenter"
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

    async fn read(&self, _ctx: Context, _request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let mut diagnostics = vec![];
        let mut state = DynamicValue::empty_object();

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

        let datacenters = match provider_data.client.compute().list_datacenters().await {
            Ok(datacenters) => datacenters,
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to list datacenters",
                    format!("API error: {}", e),
                ));
                return ReadDataSourceResponse { state, diagnostics };
            }
        };

        let configured = normalize_endpoint(provider_data.client.endpoint());
        match datacenters
            .iter()
            .find(|(_, url)| normalize_endpoint(url) == configured)
        {
            Some((name, url)) => {
                let _ = state.set_string(&AttributePath::new("id"), name.clone());
                let _ = state.set_string(&AttributePath::new("name"), name.clone());
                let _ = state.set_string(&AttributePath::new("endpoint"), url.clone());
            }
            None => {
                diagnostics.push(Diagnostic::error(
                    "Datacenter not found",
                    format!(
                        "No datacenter in the listing matches the configured endpoint '{}'",
                        provider_data.client.endpoint()
                    ),
                ));
            }
        }

        ReadDataSourceResponse { state, diagnostics }
    }
}

#[async_trait]
impl DataSourceWithConfigure for DatacenterDataSource {
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
