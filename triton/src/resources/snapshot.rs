//! Machine snapshot resource
//!
//! Snapshots are identified by name within their machine, so the import
//! ID is the composite `<machine_id>.<snapshot_name>`. Creation waits for
//! the snapshot to reach the `created` state; snapshotting a busy machine
//! can take a long time, so the budget here is wider than the usual slow
//! resource one.

use crate::api::compute::Snapshot;
use crate::api::error::ApiError;
use crate::provider_data::TritonProviderData;
use async_trait::async_trait;
use futures::FutureExt;
use std::time::Duration;
use tfplug::context::Context;
use tfplug::import::import_state_composite_id;
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
use tfplug::wait::{StateChangeConf, DEFAULT_POLL_INTERVAL};

const SNAPSHOT_CREATE_TIMEOUT: Duration = Duration::from_secs(1800);

#[derive(Default)]
pub struct SnapshotResource {
    provider_data: Option<TritonProviderData>,
}

impl SnapshotResource {
    pub fn new() -> Self {
        Self::default()
    }

    fn resource_schema() -> Schema {
        SchemaBuilder::new()
            .version(1)
            .description("Manages a snapshot of a Triton machine")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("Snapshot name, also the resource identifier")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Name of the snapshot")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("machine_id", AttributeType::String)
                    .description("UUID of the machine to snapshot")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("state", AttributeType::String)
                    .description("Current state of the snapshot")
                    .computed()
                    .build(),
            )
            .build()
    }

    fn snapshot_to_state(machine_id: &str, snapshot: &Snapshot) -> DynamicValue {
        let mut state = DynamicValue::empty_object();
        let _ = state.set_string(&AttributePath::new("id"), snapshot.name.clone());
        let _ = state.set_string(&AttributePath::new("name"), snapshot.name.clone());
        let _ = state.set_string(&AttributePath::new("machine_id"), machine_id.to_string());
        let _ = state.set_string(&AttributePath::new("state"), snapshot.state.clone());
        state
    }
}

#[async_trait]
impl Resource for SnapshotResource {
    fn type_name(&self) -> &str {
        "triton_snapshot"
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

        let name = match request.config.get_string(&AttributePath::new("name")) {
            Ok(name) => name,
            Err(_) => {
                diagnostics.push(Diagnostic::error(
                    "Missing name",
                    "The 'name' attribute is required",
                ));
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics,
                };
            }
        };
        let machine_id = match request.config.get_string(&AttributePath::new("machine_id")) {
            Ok(id) => id,
            Err(_) => {
                diagnostics.push(Diagnostic::error(
                    "Missing machine_id",
                    "The 'machine_id' attribute is required",
                ));
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics,
                };
            }
        };

        let compute = provider_data.client.compute();
        if let Err(e) = compute.create_snapshot(&machine_id, &name).await {
            diagnostics.push(Diagnostic::error(
                "Failed to create snapshot",
                format!("API error: {}", e),
            ));
            return CreateResourceResponse {
                new_state: request.planned_state,
                diagnostics,
            };
        }

        let conf: StateChangeConf<'_, Snapshot, ApiError> = StateChangeConf {
            pending: vec![],
            target: vec!["created".to_string()],
            refresh: Box::new(|| {
                let compute = provider_data.client.compute();
                let machine_id = machine_id.clone();
                let name = name.clone();
                async move {
                    let snapshot = compute.get_snapshot(&machine_id, &name).await?;
                    let state = snapshot.state.clone();
                    Ok((snapshot, state))
                }
                .boxed()
            }),
            timeout: SNAPSHOT_CREATE_TIMEOUT,
            min_interval: DEFAULT_POLL_INTERVAL,
        };

        match conf.wait().await {
            Ok(snapshot) => CreateResourceResponse {
                new_state: Self::snapshot_to_state(&machine_id, &snapshot),
                diagnostics,
            },
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Snapshot did not finish",
                    format!("Error waiting for snapshot '{}' to be created: {}", name, e),
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
        let machine_id = match request
            .current_state
            .get_string(&AttributePath::new("machine_id"))
        {
            Ok(id) => id,
            Err(_) => {
                return ReadResourceResponse {
                    new_state: None,
                    diagnostics,
                };
            }
        };

        match provider_data
            .client
            .compute()
            .get_snapshot(&machine_id, &name)
            .await
        {
            Ok(snapshot) => ReadResourceResponse {
                new_state: Some(Self::snapshot_to_state(&machine_id, &snapshot)),
                diagnostics,
            },
            Err(e) if e.is_not_found() => ReadResourceResponse {
                new_state: None,
                diagnostics,
            },
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to read snapshot",
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
        let machine_id = match request
            .prior_state
            .get_string(&AttributePath::new("machine_id"))
        {
            Ok(id) => id,
            Err(_) => {
                return DeleteResourceResponse { diagnostics };
            }
        };

        match provider_data
            .client
            .compute()
            .delete_snapshot(&machine_id, &name)
            .await
        {
            Ok(()) => DeleteResourceResponse { diagnostics },
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to delete snapshot",
                    format!("API error: {}", e),
                ));
                DeleteResourceResponse { diagnostics }
            }
        }
    }
}

#[async_trait]
impl ResourceWithConfigure for SnapshotResource {
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
impl ResourceWithImportState for SnapshotResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse {
            imported_resources: vec![],
            diagnostics: vec![],
        };
        import_state_composite_id(
            &ctx,
            AttributePath::new("machine_id"),
            AttributePath::new("id"),
            &request,
            &mut response,
        );
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Client;

    fn test_resource(server_url: &str) -> SnapshotResource {
        let client = Client::new(server_url, "demo", "aa:bb", false).unwrap();
        SnapshotResource {
            provider_data: Some(TritonProviderData::new(client)),
        }
    }

    #[tokio::test]
    async fn create_waits_for_created_state() {
        let mut server = mockito::Server::new_async().await;
        let create = server
            .mock("POST", "/demo/machines/vm-1/snapshots")
            .with_status(201)
            .with_body(r#"{"name": "nightly", "state": "queued"}"#)
            .create_async()
            .await;
        let poll = server
            .mock("GET", "/demo/machines/vm-1/snapshots/nightly")
            .with_status(200)
            .with_body(r#"{"name": "nightly", "state": "created"}"#)
            .create_async()
            .await;

        let resource = test_resource(&server.url());

        let mut config = DynamicValue::empty_object();
        config
            .set_string(&AttributePath::new("name"), "nightly".to_string())
            .unwrap();
        config
            .set_string(&AttributePath::new("machine_id"), "vm-1".to_string())
            .unwrap();

        let response = resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: "triton_snapshot".to_string(),
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
            "nightly"
        );
        assert_eq!(
            response
                .new_state
                .get_string(&AttributePath::new("state"))
                .unwrap(),
            "created"
        );
        create.assert_async().await;
        poll.assert_async().await;
    }

    #[tokio::test]
    async fn import_splits_machine_and_snapshot() {
        let resource = SnapshotResource::new();

        let response = resource
            .import_state(
                Context::new(),
                ImportResourceStateRequest {
                    type_name: "triton_snapshot".to_string(),
                    id: "vm-1.nightly".to_string(),
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
        let state = &response.imported_resources[0].state;
        assert_eq!(
            state.get_string(&AttributePath::new("machine_id")).unwrap(),
            "vm-1"
        );
        assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), "nightly");
    }
}
