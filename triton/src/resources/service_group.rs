//! Triton Service Group resource
//!
//! TSG creates do not return the new group, so creation re-reads the
//! group by name to learn its numeric id.

use crate::api::services::{CreateGroupInput, ServiceGroup};
use crate::provider_data::TritonProviderData;
use crate::resources::NAME_PATTERN;
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
use tfplug::validator::StringPatternValidator;

#[derive(Default)]
pub struct ServiceGroupResource {
    provider_data: Option<TritonProviderData>,
}

impl ServiceGroupResource {
    pub fn new() -> Self {
        Self::default()
    }

    fn resource_schema() -> Schema {
        SchemaBuilder::new()
            .version(1)
            .description("Manages a Triton Service Group")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("Numeric id of the group")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("group_name", AttributeType::String)
                    .description("Friendly name of the group")
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
                AttributeBuilder::new("template", AttributeType::String)
                    .description("Id of the instance template backing the group")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("capacity", AttributeType::Number)
                    .description("Number of instances the group maintains")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("health_check_interval", AttributeType::Number)
                    .description("Seconds between group health evaluations")
                    .optional()
                    .build(),
            )
            .build()
    }

    fn extract_input(config: &DynamicValue) -> Result<CreateGroupInput, Diagnostic> {
        let group_name = config
            .get_string(&AttributePath::new("group_name"))
            .map_err(|_| {
                Diagnostic::error("Missing group_name", "The 'group_name' attribute is required")
            })?;
        let template = config
            .get_string(&AttributePath::new("template"))
            .map_err(|_| {
                Diagnostic::error("Missing template", "The 'template' attribute is required")
            })?;
        let template_id = template.parse::<i64>().map_err(|_| {
            Diagnostic::error(
                "Invalid template",
                format!("Template id '{}' is not numeric", template),
            )
        })?;
        let capacity = config
            .get_number_opt(&AttributePath::new("capacity"))
            .map_err(|e| Diagnostic::error("Invalid capacity", e.to_string()))?
            .unwrap_or(1.0) as i64;
        let health_check_interval = config
            .get_number_opt(&AttributePath::new("health_check_interval"))
            .map_err(|e| Diagnostic::error("Invalid health_check_interval", e.to_string()))?
            .unwrap_or(300.0) as i64;

        Ok(CreateGroupInput {
            group_name,
            template_id,
            capacity,
            health_check_interval,
        })
    }

    fn group_to_state(group: &ServiceGroup) -> DynamicValue {
        let mut state = DynamicValue::empty_object();
        let _ = state.set_string(&AttributePath::new("id"), group.id.to_string());
        let _ = state.set_string(&AttributePath::new("group_name"), group.group_name.clone());
        let _ = state.set_string(&AttributePath::new("template"), group.template_id.to_string());
        let _ = state.set_number(&AttributePath::new("capacity"), group.capacity as f64);
        let _ = state.set_number(
            &AttributePath::new("health_check_interval"),
            group.health_check_interval as f64,
        );
        state
    }
}

#[async_trait]
impl Resource for ServiceGroupResource {
    fn type_name(&self) -> &str {
        "triton_service_group"
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

        let services = provider_data.client.services();
        if let Err(e) = services.create_group(&input).await {
            diagnostics.push(Diagnostic::error(
                "Failed to create service group",
                format!("API error: {}", e),
            ));
            return CreateResourceResponse {
                new_state: request.planned_state,
                diagnostics,
            };
        }

        match services.get_group(&input.group_name).await {
            Ok(group) => CreateResourceResponse {
                new_state: Self::group_to_state(&group),
                diagnostics,
            },
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to read service group after create",
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

        match provider_data.client.services().get_group(&id).await {
            Ok(group) => ReadResourceResponse {
                new_state: Some(Self::group_to_state(&group)),
                diagnostics,
            },
            Err(e) if e.is_not_found() => ReadResourceResponse {
                new_state: None,
                diagnostics,
            },
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to read service group",
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
        // TSG has no update endpoint; template, capacity and interval
        // changes roll through group replacement.
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

        match provider_data.client.services().delete_group(&id).await {
            Ok(()) => DeleteResourceResponse { diagnostics },
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to delete service group",
                    format!("API error: {}", e),
                ));
                DeleteResourceResponse { diagnostics }
            }
        }
    }
}

#[async_trait]
impl ResourceWithConfigure for ServiceGroupResource {
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
impl ResourceWithImportState for ServiceGroupResource {
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

    fn test_resource(server_url: &str) -> ServiceGroupResource {
        let client = Client::new(server_url, "demo", "aa:bb", false).unwrap();
        ServiceGroupResource {
            provider_data: Some(TritonProviderData::new(client)),
        }
    }

    #[test]
    fn non_numeric_template_is_rejected() {
        let mut config = DynamicValue::empty_object();
        config
            .set_string(&AttributePath::new("group_name"), "web".to_string())
            .unwrap();
        config
            .set_string(&AttributePath::new("template"), "not-a-number".to_string())
            .unwrap();

        let diag = ServiceGroupResource::extract_input(&config).unwrap_err();
        assert!(diag.detail.contains("not numeric"));
    }

    #[tokio::test]
    async fn create_learns_id_by_reading_back() {
        let mut server = mockito::Server::new_async().await;
        let create = server
            .mock("POST", "/v1/tsg/groups")
            .with_status(201)
            .with_body("null")
            .create_async()
            .await;
        let read_back = server
            .mock("GET", "/v1/tsg/groups/web")
            .with_status(200)
            .with_body(
                r#"{"id": 17, "group_name": "web", "template_id": 4,
                    "capacity": 3, "health_check_interval": 300}"#,
            )
            .create_async()
            .await;

        let resource = test_resource(&server.url());

        let mut config = DynamicValue::empty_object();
        config
            .set_string(&AttributePath::new("group_name"), "web".to_string())
            .unwrap();
        config
            .set_string(&AttributePath::new("template"), "4".to_string())
            .unwrap();
        config
            .set_number(&AttributePath::new("capacity"), 3.0)
            .unwrap();

        let response = resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: "triton_service_group".to_string(),
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
            "17"
        );
        create.assert_async().await;
        read_back.assert_async().await;
    }
}
