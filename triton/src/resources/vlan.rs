//! Fabric VLAN resource
//!
//! The resource id is the VLAN ID formatted as a decimal string, which
//! keeps `terraform import` a plain passthrough.

use crate::api::network::{FabricVlan, VlanInput};
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
use tfplug::validator::NumberRangeValidator;

#[derive(Default)]
pub struct VlanResource {
    provider_data: Option<TritonProviderData>,
}

impl VlanResource {
    pub fn new() -> Self {
        Self::default()
    }

    fn resource_schema() -> Schema {
        SchemaBuilder::new()
            .version(1)
            .description("Manages a VLAN on the Triton fabric")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("VLAN ID as a decimal string")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("vlan_id", AttributeType::Number)
                    .description("Number between 0-4095 indicating VLAN ID")
                    .required()
                    .force_new()
                    .validator(Box::new(NumberRangeValidator {
                        min: Some(0.0),
                        max: Some(4095.0),
                    }))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Unique name to identify VLAN")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("description", AttributeType::String)
                    .description("Description of the VLAN")
                    .optional()
                    .build(),
            )
            .build()
    }

    fn extract_input(config: &DynamicValue) -> Result<VlanInput, Diagnostic> {
        let vlan_id = config
            .get_number(&AttributePath::new("vlan_id"))
            .map_err(|_| {
                Diagnostic::error("Missing vlan_id", "The 'vlan_id' attribute is required")
            })? as i64;
        let name = config
            .get_string(&AttributePath::new("name"))
            .map_err(|_| Diagnostic::error("Missing name", "The 'name' attribute is required"))?;
        let description = config
            .get_string_opt(&AttributePath::new("description"))
            .map_err(|e| Diagnostic::error("Invalid description", e.to_string()))?
            .unwrap_or_default();

        Ok(VlanInput {
            vlan_id,
            name,
            description,
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
impl Resource for VlanResource {
    fn type_name(&self) -> &str {
        "triton_vlan"
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

        match provider_data.client.network().create_vlan(&input).await {
            Ok(vlan) => CreateResourceResponse {
                new_state: Self::vlan_to_state(&vlan),
                diagnostics,
            },
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to create VLAN",
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

        let vlan_id = match request
            .current_state
            .get_string(&AttributePath::new("id"))
            .ok()
            .and_then(|id| id.parse::<i64>().ok())
        {
            Some(id) => id,
            None => {
                return ReadResourceResponse {
                    new_state: None,
                    diagnostics,
                };
            }
        };

        match provider_data.client.network().get_vlan(vlan_id).await {
            Ok(vlan) => ReadResourceResponse {
                new_state: Some(Self::vlan_to_state(&vlan)),
                diagnostics,
            },
            Err(e) if e.is_not_found() => ReadResourceResponse {
                new_state: None,
                diagnostics,
            },
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to read VLAN",
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
        let mut diagnostics = vec![];

        let provider_data = match &self.provider_data {
            Some(data) => data,
            None => {
                diagnostics.push(Diagnostic::error(
                    "Provider not configured",
                    "Provider data was not properly configured",
                ));
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    diagnostics,
                };
            }
        };

        let input = match Self::extract_input(&request.planned_state) {
            Ok(input) => input,
            Err(diag) => {
                diagnostics.push(diag);
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    diagnostics,
                };
            }
        };

        match provider_data.client.network().update_vlan(&input).await {
            Ok(vlan) => UpdateResourceResponse {
                new_state: Self::vlan_to_state(&vlan),
                diagnostics,
            },
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to update VLAN",
                    format!("API error: {}", e),
                ));
                UpdateResourceResponse {
                    new_state: request.prior_state,
                    diagnostics,
                }
            }
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

        let vlan_id = match request
            .prior_state
            .get_string(&AttributePath::new("id"))
            .ok()
            .and_then(|id| id.parse::<i64>().ok())
        {
            Some(id) => id,
            None => {
                return DeleteResourceResponse { diagnostics };
            }
        };

        match provider_data.client.network().delete_vlan(vlan_id).await {
            Ok(()) => DeleteResourceResponse { diagnostics },
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to delete VLAN",
                    format!("API error: {}", e),
                ));
                DeleteResourceResponse { diagnostics }
            }
        }
    }
}

#[async_trait]
impl ResourceWithConfigure for VlanResource {
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
impl ResourceWithImportState for VlanResource {
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
