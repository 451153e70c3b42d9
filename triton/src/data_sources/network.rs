//! Network data source
//!
//! Looks a network up by exact name across everything the account can
//! attach instances to.

use crate::api::network::Network;
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

#[derive(Default)]
pub struct NetworkDataSource {
    provider_data: Option<TritonProviderData>,
}

impl NetworkDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn data_source_schema() -> Schema {
        SchemaBuilder::new()
            .version(1)
            .description("Looks up a network by name")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("Network UUID")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Exact name of the network")
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
                    .description("Whether the network is an account fabric")
                    .computed()
                    .build(),
            )
            .build()
    }

    fn network_to_state(network: &Network) -> DynamicValue {
        let mut state = DynamicValue::empty_object();
        let _ = state.set_string(&AttributePath::new("id"), network.id.clone());
        let _ = state.set_string(&AttributePath::new("name"), network.name.clone());
        let _ = state.set_bool(&AttributePath::new("public"), network.public);
        let _ = state.set_bool(&AttributePath::new("fabric"), network.fabric);
        state
    }
}

#[async_trait]
impl DataSource for NetworkDataSource {
    fn type_name(&self) -> &str {
        "triton_network"
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

        let networks = match provider_data.client.network().list_networks().await {
            Ok(networks) => networks,
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to list networks",
                    format!("API error: {}", e),
                ));
                return ReadDataSourceResponse { state, diagnostics };
            }
        };

        match networks.iter().find(|network| network.name == name) {
            Some(network) => ReadDataSourceResponse {
                state: Self::network_to_state(network),
                diagnostics,
            },
            None => {
                diagnostics.push(Diagnostic::error(
                    "Network not found",
                    format!("No network named '{}' is visible to this account", name),
                ));
                ReadDataSourceResponse { state, diagnostics }
            }
        }
    }
}

#[async_trait]
impl DataSourceWithConfigure for NetworkDataSource {
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
