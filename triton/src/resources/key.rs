//! Account SSH key resource
//!
//! The key name defaults to the comment field of the public key material
//! when one is present. Keys are immutable, so every configurable
//! attribute forces replacement.

use crate::api::account::{CreateKeyInput, Key};
use crate::provider_data::TritonProviderData;
use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::import::import_state_passthrough_id;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, ResourceWithImportState, UpdateResourceRequest, UpdateResourceResponse,
    ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};

#[derive(Default)]
pub struct KeyResource {
    provider_data: Option<TritonProviderData>,
}

impl KeyResource {
    pub fn new() -> Self {
        Self::default()
    }

    fn resource_schema() -> Schema {
        SchemaBuilder::new()
            .version(1)
            .description("Manages an SSH key in the Triton account")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("Key name, also the resource identifier")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Name of the key; defaults to the key comment")
                    .optional()
                    .computed()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("key", AttributeType::String)
                    .description("Public key material in authorized_keys format")
                    .required()
                    .force_new()
                    .build(),
            )
            .build()
    }

    fn extract_input(config: &DynamicValue) -> Result<CreateKeyInput, Diagnostic> {
        let key = config
            .get_string(&AttributePath::new("key"))
            .map_err(|_| Diagnostic::error("Missing key", "The 'key' attribute is required"))?;

        let name = match config
            .get_string_opt(&AttributePath::new("name"))
            .map_err(|e| Diagnostic::error("Invalid name", e.to_string()))?
        {
            Some(name) if !name.is_empty() => name,
            _ => key
                .splitn(3, ' ')
                .nth(2)
                .map(str::to_string)
                .filter(|comment| !comment.is_empty())
                .ok_or_else(|| {
                    Diagnostic::error(
                        "Cannot determine key name",
                        "No key name specified, and key material has no comment",
                    )
                })?,
        };

        Ok(CreateKeyInput { name, key })
    }

    fn key_to_state(key: &Key) -> DynamicValue {
        let mut state = DynamicValue::empty_object();
        let _ = state.set_string(&AttributePath::new("id"), key.name.clone());
        let _ = state.set_string(&AttributePath::new("name"), key.name.clone());
        let _ = state.set_string(&AttributePath::new("key"), key.key.clone());
        state
    }
}

#[async_trait]
impl Resource for KeyResource {
    fn type_name(&self) -> &str {
        "triton_key"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        ResourceSchemaResponse {
            schema: Self::resource_schema(),
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        ValidateResourceConfigResponse {
            diagnostics: Self::resource_schema().validate_config(&request.config),
        }
    }

    async fn create(
        &self,
        _ctx: Context,
        request: CreateResourceRequest,
    ) -> CreateResourceResponse {
        let mut diagnostics = vec![];

        let provider_data = match &self.provider_data {
            Some(data) => data,
            None => {
                diagnostics.push(Diagnostic::error(
                    "Provider not configured",
                    "Provider data was not properly configured",
                ));
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics,
                };
            }
        };

        let input = match Self::extract_input(&request.config) {
            Ok(input) => input,
            Err(diag) => {
                diagnostics.push(diag);
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics,
                };
            }
        };

        match provider_data.client.account_api().create_key(&input).await {
            Ok(key) => CreateResourceResponse {
                new_state: Self::key_to_state(&key),
                diagnostics,
            },
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to create key",
                    format!("API error: {}", e),
                ));
                CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics,
                }
            }
        }
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let mut diagnostics = vec![];

        let provider_data = match &self.provider_data {
            Some(data) => data,
            None => {
                diagnostics.push(Diagnostic::error(
                    "Provider not configured",
                    "Provider data was not properly configured",
                ));
                return ReadResourceResponse {
                    new_state: Some(request.current_state),
                    diagnostics,
                };
            }
        };

        let name = match request.current_state.get_string(&AttributePath::new("id")) {
            Ok(name) => name,
            Err(_) => {
                return ReadResourceResponse {
                    new_state: None,
                    diagnostics,
                };
            }
        };

        match provider_data.client.account_api().get_key(&name).await {
            Ok(key) => ReadResourceResponse {
                new_state: Some(Self::key_to_state(&key)),
                diagnostics,
            },
            Err(e) if e.is_not_found() => ReadResourceResponse {
                new_state: None,
                diagnostics,
            },
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to read key",
                    format!("API error: {}", e),
                ));
                ReadResourceResponse {
                    new_state: Some(request.current_state),
                    diagnostics,
                }
            }
        }
    }

    async fn update(
        &self,
        _ctx: Context,
        request: UpdateResourceRequest,
    ) -> UpdateResourceResponse {
        // Every configurable attribute forces replacement.
        UpdateResourceResponse {
            new_state: request.planned_state,
            diagnostics: vec![],
        }
    }

    async fn delete(
        &self,
        _ctx: Context,
        request: DeleteResourceRequest,
    ) -> DeleteResourceResponse {
        let mut diagnostics = vec![];

        let provider_data = match &self.provider_data {
            Some(data) => data,
            None => {
                return DeleteResourceResponse { diagnostics };
            }
        };

        let name = match request.prior_state.get_string(&AttributePath::new("id")) {
            Ok(name) => name,
            Err(_) => {
                return DeleteResourceResponse { diagnostics };
            }
        };

        match provider_data.client.account_api().delete_key(&name).await {
            Ok(()) => DeleteResourceResponse { diagnostics },
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to delete key",
                    format!("API error: {}", e),
                ));
                DeleteResourceResponse { diagnostics }
            }
        }
    }
}

#[async_trait]
impl ResourceWithConfigure for KeyResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
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
                "No provider data was provided to the resource",
            ));
        }

        ConfigureResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithImportState for KeyResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse {
            imported_resources: vec![],
            diagnostics: vec![],
        };
        import_state_passthrough_id(&ctx, AttributePath::new("id"), &request, &mut response);
        response
    }
}
