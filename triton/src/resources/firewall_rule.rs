//! Cloud firewall rule resource
//!
//! Rule text is stored whitespace-trimmed so that formatting-only edits
//! do not show up as diffs.

use crate::api::network::{FirewallRule, FirewallRuleInput};
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
pub struct FirewallRuleResource {
    provider_data: Option<TritonProviderData>,
}

impl FirewallRuleResource {
    pub fn new() -> Self {
        Self::default()
    }

    fn resource_schema() -> Schema {
        SchemaBuilder::new()
            .version(1)
            .description("Manages a Triton cloud firewall rule")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("Rule UUID")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("rule", AttributeType::String)
                    .description("Firewall rule text")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("enabled", AttributeType::Bool)
                    .description("Indicates if the rule is enabled")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("description", AttributeType::String)
                    .description("Human-readable description of the rule")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("global", AttributeType::Bool)
                    .description("Indicates whether or not the rule is global")
                    .computed()
                    .build(),
            )
            .build()
    }

    fn extract_input(config: &DynamicValue) -> Result<FirewallRuleInput, Diagnostic> {
        let rule = config
            .get_string(&AttributePath::new("rule"))
            .map_err(|_| Diagnostic::error("Missing rule", "The 'rule' attribute is required"))?;
        let enabled = config
            .get_bool_opt(&AttributePath::new("enabled"))
            .map_err(|e| Diagnostic::error("Invalid enabled", e.to_string()))?
            .unwrap_or(false);
        let description = config
            .get_string_opt(&AttributePath::new("description"))
            .map_err(|e| Diagnostic::error("Invalid description", e.to_string()))?
            .unwrap_or_default();

        Ok(FirewallRuleInput {
            rule: rule.trim().to_string(),
            enabled,
            description,
        })
    }

    fn rule_to_state(rule: &FirewallRule) -> DynamicValue {
        let mut state = DynamicValue::empty_object();
        let _ = state.set_string(&AttributePath::new("id"), rule.id.clone());
        let _ = state.set_string(&AttributePath::new("rule"), rule.rule.trim().to_string());
        let _ = state.set_bool(&AttributePath::new("enabled"), rule.enabled);
        let _ = state.set_bool(&AttributePath::new("global"), rule.global);
        let _ = state.set_string(&AttributePath::new("description"), rule.description.clone());
        state
    }
}

#[async_trait]
impl Resource for FirewallRuleResource {
    fn type_name(&self) -> &str {
        "triton_firewall_rule"
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

        match provider_data
            .client
            .network()
            .create_firewall_rule(&input)
            .await
        {
            Ok(rule) => CreateResourceResponse {
                new_state: Self::rule_to_state(&rule),
                diagnostics,
            },
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to create firewall rule",
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

        let id = match request.current_state.get_string(&AttributePath::new("id")) {
            Ok(id) => id,
            Err(_) => {
                return ReadResourceResponse {
                    new_state: None,
                    diagnostics,
                };
            }
        };

        match provider_data.client.network().get_firewall_rule(&id).await {
            Ok(rule) => ReadResourceResponse {
                new_state: Some(Self::rule_to_state(&rule)),
                diagnostics,
            },
            Err(e) if e.is_not_found() => ReadResourceResponse {
                new_state: None,
                diagnostics,
            },
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to read firewall rule",
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

        let id = match request.prior_state.get_string(&AttributePath::new("id")) {
            Ok(id) => id,
            Err(e) => {
                diagnostics.push(Diagnostic::error("Missing id", e.to_string()));
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

        match provider_data
            .client
            .network()
            .update_firewall_rule(&id, &input)
            .await
        {
            Ok(rule) => UpdateResourceResponse {
                new_state: Self::rule_to_state(&rule),
                diagnostics,
            },
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to update firewall rule",
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

        let id = match request.prior_state.get_string(&AttributePath::new("id")) {
            Ok(id) => id,
            Err(_) => {
                return DeleteResourceResponse { diagnostics };
            }
        };

        match provider_data.client.network().delete_firewall_rule(&id).await {
            Ok(()) => DeleteResourceResponse { diagnostics },
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to delete firewall rule",
                    format!("API error: {}", e),
                ));
                DeleteResourceResponse { diagnostics }
            }
        }
    }
}

#[async_trait]
impl ResourceWithConfigure for FirewallRuleResource {
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
impl ResourceWithImportState for FirewallRuleResource {
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
