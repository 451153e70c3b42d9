//! NFS volume resource
//!
//! Volumes provision storage asynchronously: create waits for `ready`,
//! delete waits for `deleted`. Rename is the only in-place update; the
//! new name is polled for because CloudAPI acknowledges the rename before
//! it lands.

use crate::api::error::ApiError;
use crate::api::volumes::{CreateVolumeInput, Volume};
use crate::provider_data::TritonProviderData;
use crate::resources::SLOW_RESOURCE_TIMEOUT;
use async_trait::async_trait;
use futures::FutureExt;
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
use tfplug::wait::{wait_for, StateChangeConf, DEFAULT_POLL_INTERVAL};

#[derive(Default)]
pub struct VolumeResource {
    provider_data: Option<TritonProviderData>,
}

impl VolumeResource {
    pub fn new() -> Self {
        Self::default()
    }

    fn resource_schema() -> Schema {
        SchemaBuilder::new()
            .version(1)
            .description("Manages a Triton NFS volume")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("Volume UUID")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Name of the volume; generated by CloudAPI when omitted")
                    .optional()
                    .computed()
                    .validator(Box::new(StringPatternValidator {
                        pattern: regex::Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_\.\-]+$")
                            .expect("static pattern compiles"),
                        description: "a letter or digit followed by letters, digits, '_', '.' or '-'"
                            .to_string(),
                    }))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("networks", AttributeType::List(Box::new(AttributeType::String)))
                    .description("Fabric networks the volume is reachable on")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("size", AttributeType::Number)
                    .description("Size of the volume in MiB")
                    .optional()
                    .computed()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("type", AttributeType::String)
                    .description("Type of the volume")
                    .optional()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("filesystem_path", AttributeType::String)
                    .description("NFS path the volume is mounted from")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("owner", AttributeType::String)
                    .description("UUID of the account owning the volume")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("state", AttributeType::String)
                    .description("Current state of the volume")
                    .computed()
                    .build(),
            )
            .build()
    }

    fn extract_input(config: &DynamicValue) -> Result<CreateVolumeInput, Diagnostic> {
        let name = config
            .get_string_opt(&AttributePath::new("name"))
            .map_err(|e| Diagnostic::error("Invalid name", e.to_string()))?;
        let size = config
            .get_number_opt(&AttributePath::new("size"))
            .map_err(|e| Diagnostic::error("Invalid size", e.to_string()))?
            .map(|n| n as i64);
        let type_ = config
            .get_string_opt(&AttributePath::new("type"))
            .map_err(|e| Diagnostic::error("Invalid type", e.to_string()))?
            .unwrap_or_else(|| "tritonnfs".to_string());
        let networks = config
            .get_list_opt(&AttributePath::new("networks"))
            .map_err(|e| Diagnostic::error("Invalid networks", e.to_string()))?
            .unwrap_or_default()
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();

        Ok(CreateVolumeInput {
            name,
            type_: Some(type_),
            size,
            networks,
        })
    }

    fn volume_to_state(volume: &Volume) -> DynamicValue {
        let mut state = DynamicValue::empty_object();
        let _ = state.set_string(&AttributePath::new("id"), volume.id.clone());
        let _ = state.set_string(&AttributePath::new("name"), volume.name.clone());
        let _ = state.set_string(&AttributePath::new("type"), volume.type_.clone());
        let _ = state.set_number(&AttributePath::new("size"), volume.size as f64);
        let _ = state.set_string(
            &AttributePath::new("filesystem_path"),
            volume.filesystem_path.clone(),
        );
        let _ = state.set_string(&AttributePath::new("owner"), volume.owner_uuid.clone());
        let _ = state.set_string(&AttributePath::new("state"), volume.state.clone());
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
impl Resource for VolumeResource {
    fn type_name(&self) -> &str {
        "triton_volume"
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

        let created = match provider_data.client.volumes().create(&input).await {
            Ok(volume) => volume,
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to create volume",
                    format!("API error: {}", e),
                ));
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics,
                };
            }
        };

        let id = created.id.clone();
        let conf: StateChangeConf<'_, Volume, ApiError> = StateChangeConf {
            pending: vec!["creating".to_string()],
            target: vec!["ready".to_string()],
            refresh: Box::new(|| {
                let volumes = provider_data.client.volumes();
                let id = id.clone();
                async move {
                    let volume = volumes.get(&id).await?;
                    let state = volume.state.clone();
                    Ok((volume, state))
                }
                .boxed()
            }),
            timeout: SLOW_RESOURCE_TIMEOUT,
            min_interval: DEFAULT_POLL_INTERVAL,
        };

        match conf.wait().await {
            Ok(volume) => CreateResourceResponse {
                new_state: Self::volume_to_state(&volume),
                diagnostics,
            },
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Volume did not become ready",
                    format!("Error waiting for volume '{}': {}", created.id, e),
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

        match provider_data.client.volumes().get(&id).await {
            // A failed volume only goes away, it never recovers
            Ok(volume) if volume.state == "failed" => ReadResourceResponse {
                new_state: None,
                diagnostics,
            },
            Ok(volume) => ReadResourceResponse {
                new_state: Some(Self::volume_to_state(&volume)),
                diagnostics,
            },
            Err(e) if e.is_not_found() => ReadResourceResponse {
                new_state: None,
                diagnostics,
            },
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to read volume",
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

        let old_name = request
            .prior_state
            .get_string_opt(&AttributePath::new("name"))
            .ok()
            .flatten()
            .unwrap_or_default();
        let new_name = request
            .planned_state
            .get_string_opt(&AttributePath::new("name"))
            .ok()
            .flatten()
            .unwrap_or_default();

        if new_name != old_name && !new_name.is_empty() {
            if let Err(e) = provider_data.client.volumes().rename(&id, &new_name).await {
                diagnostics.push(Diagnostic::error(
                    "Failed to rename volume",
                    format!("API error: {}", e),
                ));
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    diagnostics,
                };
            }

            let volumes = provider_data.client.volumes();
            let wait = wait_for(
                "volume name to converge",
                SLOW_RESOURCE_TIMEOUT,
                DEFAULT_POLL_INTERVAL,
                || volumes.get(&id),
                |volume: &Volume| volume.name == new_name,
            )
            .await;
            if let Err(e) = wait {
                diagnostics.push(Diagnostic::error(
                    "Volume rename did not converge",
                    format!("Error waiting for volume '{}' to be renamed: {}", id, e),
                ));
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    diagnostics,
                };
            }
        }

        match provider_data.client.volumes().get(&id).await {
            Ok(volume) => UpdateResourceResponse {
                new_state: Self::volume_to_state(&volume),
                diagnostics,
            },
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to read volume",
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

        match provider_data.client.volumes().delete(&id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => return DeleteResourceResponse { diagnostics },
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to delete volume",
                    format!("API error: {}", e),
                ));
                return DeleteResourceResponse { diagnostics };
            }
        }

        let conf = StateChangeConf {
            pending: vec![],
            target: vec!["deleted".to_string()],
            refresh: Box::new(|| {
                let volumes = provider_data.client.volumes();
                let id = id.clone();
                async move {
                    match volumes.get(&id).await {
                        Ok(volume) => {
                            let state = volume.state.clone();
                            Ok((Some(volume), state))
                        }
                        Err(e) if e.is_not_found() => Ok((None, "deleted".to_string())),
                        Err(e) => Err(e),
                    }
                }
                .boxed()
            }),
            timeout: SLOW_RESOURCE_TIMEOUT,
            min_interval: DEFAULT_POLL_INTERVAL,
        };

        if let Err(e) = conf.wait().await {
            diagnostics.push(Diagnostic::error(
                "Volume was not deleted",
                format!("Error waiting for volume '{}' to be deleted: {}", id, e),
            ));
        }

        DeleteResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithConfigure for VolumeResource {
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
impl ResourceWithImportState for VolumeResource {
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

    fn test_resource(server_url: &str) -> VolumeResource {
        let client = Client::new(server_url, "demo", "aa:bb", false).unwrap();
        VolumeResource {
            provider_data: Some(TritonProviderData::new(client)),
        }
    }

    #[test]
    fn type_defaults_to_tritonnfs() {
        let config = DynamicValue::empty_object();
        let input = VolumeResource::extract_input(&config).unwrap();
        assert_eq!(input.type_.as_deref(), Some("tritonnfs"));
    }

    #[tokio::test]
    async fn create_waits_for_ready_state() {
        let mut server = mockito::Server::new_async().await;
        let create = server
            .mock("POST", "/demo/volumes")
            .with_status(201)
            .with_body(r#"{"id": "vol-1", "name": "data", "state": "creating"}"#)
            .create_async()
            .await;
        let poll = server
            .mock("GET", "/demo/volumes/vol-1")
            .with_status(200)
            .with_body(
                r#"{"id": "vol-1", "name": "data", "type": "tritonnfs",
                    "filesystem_path": "nfs.example:/exports/data",
                    "owner_uuid": "b4c9", "size": 10240, "state": "ready"}"#,
            )
            .create_async()
            .await;

        let resource = test_resource(&server.url());

        let mut config = DynamicValue::empty_object();
        config
            .set_string(&AttributePath::new("name"), "data".to_string())
            .unwrap();

        let response = resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: "triton_volume".to_string(),
                    planned_state: config.clone(),
                    config,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
        assert_eq!(
            response
                .new_state
                .get_string(&AttributePath::new("state"))
                .unwrap(),
            "ready"
        );
        assert_eq!(
            response
                .new_state
                .get_string(&AttributePath::new("filesystem_path"))
                .unwrap(),
            "nfs.example:/exports/data"
        );
        create.assert_async().await;
        poll.assert_async().await;
    }

    #[tokio::test]
    async fn read_failed_volume_clears_state() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/demo/volumes/vol-1")
            .with_status(200)
            .with_body(r#"{"id": "vol-1", "name": "data", "state": "failed"}"#)
            .create_async()
            .await;

        let resource = test_resource(&server.url());

        let mut state = DynamicValue::empty_object();
        state
            .set_string(&AttributePath::new("id"), "vol-1".to_string())
            .unwrap();

        let response = resource
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: "triton_volume".to_string(),
                    current_state: state,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
        assert!(response.new_state.is_none());
    }

    #[tokio::test]
    async fn delete_tolerates_missing_volume() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("DELETE", "/demo/volumes/vol-1")
            .with_status(404)
            .with_body(r#"{"code": "ResourceNotFound", "message": "volume not found"}"#)
            .create_async()
            .await;

        let resource = test_resource(&server.url());

        let mut state = DynamicValue::empty_object();
        state
            .set_string(&AttributePath::new("id"), "vol-1".to_string())
            .unwrap();

        let response = resource
            .delete(
                Context::new(),
                DeleteResourceRequest {
                    type_name: "triton_volume".to_string(),
                    prior_state: state,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
    }
}
