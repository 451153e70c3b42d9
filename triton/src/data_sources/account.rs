//! Account data source

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
pub struct AccountDataSource {
    provider_data: Option<TritonProviderData>,
}

impl AccountDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn data_source_schema() -> Schema {
        SchemaBuilder::new()
            .version(1)
            .description("Looks up the account the provider is configured for")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("Account UUID")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("login", AttributeType::String)
                    .description("Account login name")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("email", AttributeType::String)
                    .description("Account email address")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("cns_enabled", AttributeType::Bool)
                    .description("Whether CNS is enabled for the account")
                    .computed()
                    .build(),
            )
            .build()
    }
}

#[async_trait]
impl DataSource for AccountDataSource {
    fn type_name(&self) -> &str {
        "triton_account"
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

        match provider_data.client.account_api().get().await {
            Ok(account) => {
                let _ = state.set_string(&AttributePath::new("id"), account.id);
                let _ = state.set_string(&AttributePath::new("login"), account.login);
                let _ = state.set_string(&AttributePath::new("email"), account.email);
                let _ = state.set_bool(
                    &AttributePath::new("cns_enabled"),
                    account.triton_cns_enabled,
                );
            }
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to read account",
                    format!("API error: {}", e),
                ));
            }
        }

        ReadDataSourceResponse { state, diagnostics }
    }
}

#[async_trait]
impl DataSourceWithConfigure for AccountDataSource {
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
    async fn read_exposes_account_fields() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/demo")
            .with_status(200)
            .with_body(
                r#"{"id": "b4c9", "login": "demo", "email": "demo@example.com",
                    "triton_cns_enabled": true}"#,
            )
            .create_async()
            .await;

        let client = Client::new(&server.url(), "demo", "aa:bb", false).unwrap();
        let data_source = AccountDataSource {
            provider_data: Some(TritonProviderData::new(client)),
        };

        let response = data_source
            .read(
                Context::new(),
                ReadDataSourceRequest {
                    type_name: "triton_account".to_string(),
                    config: DynamicValue::empty_object(),
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
        assert_eq!(
            response
                .state
                .get_string(&AttributePath::new("login"))
                .unwrap(),
            "demo"
        );
        assert!(response
            .state
            .get_bool(&AttributePath::new("cns_enabled"))
            .unwrap());
    }
}
