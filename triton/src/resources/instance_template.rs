//! Triton Service Group instance template resource
//!
//! Templates are immutable once created; every configurable attribute
//! forces replacement.

use crate::api::services::{CreateTemplateInput, InstanceTemplate};
use crate::provider_data::TritonProviderData;
use crate::resources::NAME_PATTERN;
use async_trait::async_trait;
use std::collections::HashMap;
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
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::StringPatternValidator;

#[derive(Default)]
pub struct InstanceTemplateResource {
    provider_data: Option<TritonProviderData>,
}

impl InstanceTemplateResource {
    pub fn new() -> Self {
        Self::default()
    }

    fn resource_schema() -> Schema {
        SchemaBuilder::new()
            .version(1)
            .description("Manages a Triton Service Group instance template")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("Template id")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("template_name", AttributeType::String)
                    .description("Friendly name of the template")
                    .required()
                    .force_new()
                    .validator(Box::new(StringPatternValidator {
                        pattern: regex::Regex::new(NAME_PATTERN)
                            .expect("static pattern compiles"),
                        description: "a name starting with a letter or digit".to_string(),
                    }))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("package", AttributeType::String)
                    .description("Package to provision group instances with")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("image_id", AttributeType::String)
                    .description("UUID of the image to provision from")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("firewall_enabled", AttributeType::Bool)
                    .description("Whether instances get the cloud firewall enabled")
                    .optional()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("networks", AttributeType::List(Box::new(AttributeType::String)))
                    .description("Networks to attach group instances to")
                    .optional()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("userdata", AttributeType::String)
                    .description("Data copied to the instance on boot")
                    .optional()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("metadata", AttributeType::Map(Box::new(AttributeType::String)))
                    .description("Metadata applied to group instances")
                    .optional()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("tags", AttributeType::Map(Box::new(AttributeType::String)))
                    .description("Tags applied to group instances")
                    .optional()
                    .force_new()
                    .build(),
            )
            .build()
    }

    fn extract_input(config: &DynamicValue) -> Result<CreateTemplateInput, Diagnostic> {
        let template_name = config
            .get_string(&AttributePath::new("template_name"))
            .map_err(|_| {
                Diagnostic::error(
                    "Missing template_name",
                    "The 'template_name' attribute is required",
                )
            })?;
        let package = config
            .get_string(&AttributePath::new("package"))
            .map_err(|_| {
                Diagnostic::error("Missing package", "The 'package' attribute is required")
            })?;
        let image_id = config
            .get_string(&AttributePath::new("image_id"))
            .map_err(|_| {
                Diagnostic::error("Missing image_id", "The 'image_id' attribute is required")
            })?;
        let firewall_enabled = config
            .get_bool_opt(&AttributePath::new("firewall_enabled"))
            .map_err(|e| Diagnostic::error("Invalid firewall_enabled", e.to_string()))?
            .unwrap_or(false);
        let networks = config
            .get_list_opt(&AttributePath::new("networks"))
            .map_err(|e| Diagnostic::error("Invalid networks", e.to_string()))?
            .unwrap_or_default()
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();
        let userdata = config
            .get_string_opt(&AttributePath::new("userdata"))
            .map_err(|e| Diagnostic::error("Invalid userdata", e.to_string()))?
            .unwrap_or_default();
        let metadata = string_map(config, "metadata")?;
        let tags = string_map(config, "tags")?;

        Ok(CreateTemplateInput {
            template_name,
            package,
            image_id,
            firewall_enabled,
            networks,
            userdata,
            metadata,
            tags,
        })
    }

    fn template_to_state(template: &InstanceTemplate) -> DynamicValue {
        let mut state = DynamicValue::empty_object();
        let _ = state.set_string(&AttributePath::new("id"), template.id.clone());
        let _ = state.set_string(
            &AttributePath::new("template_name"),
            template.template_name.clone(),
        );
        let _ = state.set_string(&AttributePath::new("package"), template.package.clone());
        let _ = state.set_string(&AttributePath::new("image_id"), template.image_id.clone());
        let _ = state.set_bool(
            &AttributePath::new("firewall_enabled"),
            template.firewall_enabled,
        );
        let _ = state.set_list(
            &AttributePath::new("networks"),
            template
                .networks
                .iter()
                .map(|n| Dynamic::String(n.clone()))
                .collect(),
        );
        let _ = state.set_string(&AttributePath::new("userdata"), template.userdata.clone());
        let _ = state.set_map(
            &AttributePath::new("metadata"),
            template
                .metadata
                .iter()
                .map(|(k, v)| (k.clone(), Dynamic::String(v.clone())))
                .collect(),
        );
        let _ = state.set_map(
            &AttributePath::new("tags"),
            template
                .tags
                .iter()
                .map(|(k, v)| (k.clone(), Dynamic::String(v.clone())))
                .collect(),
        );
        state
    }
}

fn string_map(config: &DynamicValue, attr: &str) -> Result<HashMap<String, String>, Diagnostic> {
    Ok(config
        .get_map_opt(&AttributePath::new(attr))
        .map_err(|e| Diagnostic::error(format!("Invalid {}", attr), e.to_string()))?
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(k, v)| v.as_str().map(|s| (k, s.to_string())))
        .collect())
}

#[async_trait]
impl Resource for InstanceTemplateResource {
    fn type_name(&self) -> &str {
        "triton_instance_template"
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

        match provider_data.client.services().create_template(&input).await {
            Ok(template) => CreateResourceResponse {
                new_state: Self::template_to_state(&template),
                diagnostics,
            },
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to create instance template",
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

        match provider_data.client.services().get_template(&id).await {
            Ok(template) => ReadResourceResponse {
                new_state: Some(Self::template_to_state(&template)),
                diagnostics,
            },
            Err(e) if e.is_not_found() => ReadResourceResponse {
                new_state: None,
                diagnostics,
            },
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to read instance template",
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

        let id = match request.prior_state.get_string(&AttributePath::new("id")) {
            Ok(id) => id,
            Err(_) => {
                return DeleteResourceResponse { diagnostics };
            }
        };

        match provider_data.client.services().delete_template(&id).await {
            Ok(()) => DeleteResourceResponse { diagnostics },
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to delete instance template",
                    format!("API error: {}", e),
                ));
                DeleteResourceResponse { diagnostics }
            }
        }
    }
}

#[async_trait]
impl ResourceWithConfigure for InstanceTemplateResource {
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
impl ResourceWithImportState for InstanceTemplateResource {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Client;

    fn test_resource(server_url: &str) -> InstanceTemplateResource {
        let client = Client::new(server_url, "demo", "aa:bb", false).unwrap();
        InstanceTemplateResource {
            provider_data: Some(TritonProviderData::new(client)),
        }
    }

    #[tokio::test]
    async fn create_builds_state_from_response() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/tsg/templates")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"template_name": "web", "package": "g4-highcpu-1G"}"#.to_string(),
            ))
            .with_status(201)
            .with_body(
                r#"{"id": "tpl-9", "template_name": "web", "package": "g4-highcpu-1G",
                    "image_id": "img-1", "firewall_enabled": true,
                    "networks": ["net-1"], "tags": {"role": "web"}}"#,
            )
            .create_async()
            .await;

        let resource = test_resource(&server.url());

        let mut config = DynamicValue::empty_object();
        config
            .set_string(&AttributePath::new("template_name"), "web".to_string())
            .unwrap();
        config
            .set_string(&AttributePath::new("package"), "g4-highcpu-1G".to_string())
            .unwrap();
        config
            .set_string(&AttributePath::new("image_id"), "img-1".to_string())
            .unwrap();
        config
            .set_bool(&AttributePath::new("firewall_enabled"), true)
            .unwrap();
        config
            .set_list(
                &AttributePath::new("networks"),
                vec![Dynamic::String("net-1".to_string())],
            )
            .unwrap();

        let response = resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: "triton_instance_template".to_string(),
                    planned_state: config.clone(),
                    config,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
        assert_eq!(
            response
                .new_state
                .get_string(&AttributePath::new("id"))
                .unwrap(),
            "tpl-9"
        );
        let tags = response
            .new_state
            .get_map(&AttributePath::new("tags"))
            .unwrap();
        assert_eq!(tags.get("role").and_then(|v| v.as_str()), Some("web"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn read_missing_template_clears_state() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/v1/tsg/templates/tpl-9")
            .with_status(404)
            .with_body(r#"{"code": "ResourceNotFound", "message": "template not found"}"#)
            .create_async()
            .await;

        let resource = test_resource(&server.url());

        let mut state = DynamicValue::empty_object();
        state
            .set_string(&AttributePath::new("id"), "tpl-9".to_string())
            .unwrap();

        let response = resource
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: "triton_instance_template".to_string(),
                    current_state: state,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
        assert!(response.new_state.is_none());
    }
}
