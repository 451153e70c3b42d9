//! Fabric network resource
//!
//! Fabric networks live on a VLAN and have no mutable attributes, so the
//! resource only creates, reads and deletes. Deleting a fabric network
//! while instances still hold NICs on it fails with InvalidArgument until
//! the NICs drain; the delete is retried through that window.

use crate::api::error::ApiError;
use crate::api::network::{CreateFabricNetworkInput, Network};
use crate::provider_data::TritonProviderData;
use async_trait::async_trait;
use std::collections::HashMap;
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
use tfplug::retry::{retry_on_predicate, RetryError, RetryPolicy};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

#[derive(Default)]
pub struct FabricResource {
    provider_data: Option<TritonProviderData>,
}

impl FabricResource {
    pub fn new() -> Self {
        Self::default()
    }

    fn resource_schema() -> Schema {
        SchemaBuilder::new()
            .version(1)
            .description("Manages a network on a Triton fabric VLAN")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("Network UUID")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Network name")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("public", AttributeType::Bool)
                    .description("Whether or not this is an RFC1918 network")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("fabric", AttributeType::Bool)
                    .description("Whether or not this network is on a fabric")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("description", AttributeType::String)
                    .description("Description of network")
                    .optional()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("subnet", AttributeType::String)
                    .description("CIDR formatted string describing network address space")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("provision_start_ip", AttributeType::String)
                    .description("First IP on the network that can be assigned")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("provision_end_ip", AttributeType::String)
                    .description("Last assignable IP on the network")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("gateway", AttributeType::String)
                    .description("Gateway IP")
                    .optional()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(
                    "resolvers",
                    AttributeType::List(Box::new(AttributeType::String)),
                )
                .description("List of IP addresses for DNS resolvers")
                .optional()
                .computed()
                .build(),
            )
            .attribute(
                AttributeBuilder::new("routes", AttributeType::Map(Box::new(AttributeType::String)))
                    .description("Map of CIDR block to Gateway IP address")
                    .optional()
                    .computed()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("internet_nat", AttributeType::Bool)
                    .description("Whether or not a NAT zone is provisioned at the Gateway IP address")
                    .optional()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("vlan_id", AttributeType::Number)
                    .description("VLAN on which the network exists")
                    .required()
                    .force_new()
                    .build(),
            )
            .build()
    }

    fn extract_input(config: &DynamicValue) -> Result<(i64, CreateFabricNetworkInput), Diagnostic> {
        let vlan_id = config
            .get_number(&AttributePath::new("vlan_id"))
            .map_err(|_| {
                Diagnostic::error("Missing vlan_id", "The 'vlan_id' attribute is required")
            })? as i64;
        let name = config
            .get_string(&AttributePath::new("name"))
            .map_err(|_| Diagnostic::error("Missing name", "The 'name' attribute is required"))?;
        let subnet = config
            .get_string(&AttributePath::new("subnet"))
            .map_err(|_| {
                Diagnostic::error("Missing subnet", "The 'subnet' attribute is required")
            })?;
        let provision_start_ip = config
            .get_string(&AttributePath::new("provision_start_ip"))
            .map_err(|_| {
                Diagnostic::error(
                    "Missing provision_start_ip",
                    "The 'provision_start_ip' attribute is required",
                )
            })?;
        let provision_end_ip = config
            .get_string(&AttributePath::new("provision_end_ip"))
            .map_err(|_| {
                Diagnostic::error(
                    "Missing provision_end_ip",
                    "The 'provision_end_ip' attribute is required",
                )
            })?;

        let description = config
            .get_string_opt(&AttributePath::new("description"))
            .unwrap_or_default()
            .unwrap_or_default();
        let gateway = config
            .get_string_opt(&AttributePath::new("gateway"))
            .unwrap_or_default()
            .unwrap_or_default();
        let resolvers = config
            .get_list_opt(&AttributePath::new("resolvers"))
            .unwrap_or_default()
            .unwrap_or_default()
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();

        let mut routes = HashMap::new();
        if let Ok(Some(raw_routes)) = config.get_map_opt(&AttributePath::new("routes")) {
            for (cidr, gateway_ip) in raw_routes {
                let Some(ip) = gateway_ip.as_str() else {
                    return Err(Diagnostic::error(
                        "Invalid route",
                        format!("cannot use '{:?}' as an IP address", gateway_ip),
                    ));
                };
                routes.insert(cidr, ip.to_string());
            }
        }

        // NAT zones are provisioned unless explicitly turned off
        let internet_nat = config
            .get_bool_opt(&AttributePath::new("internet_nat"))
            .unwrap_or_default()
            .unwrap_or(true);

        Ok((
            vlan_id,
            CreateFabricNetworkInput {
                name,
                description,
                subnet,
                provision_start_ip,
                provision_end_ip,
                gateway,
                resolvers,
                routes,
                internet_nat,
            },
        ))
    }

    fn network_to_state(vlan_id: i64, network: &Network) -> DynamicValue {
        let mut state = DynamicValue::empty_object();
        let _ = state.set_string(&AttributePath::new("id"), network.id.clone());
        let _ = state.set_string(&AttributePath::new("name"), network.name.clone());
        let _ = state.set_bool(&AttributePath::new("public"), network.public);
        let _ = state.set_bool(&AttributePath::new("fabric"), network.fabric);
        let _ = state.set_string(
            &AttributePath::new("description"),
            network.description.clone(),
        );
        let _ = state.set_string(&AttributePath::new("subnet"), network.subnet.clone());
        let _ = state.set_string(
            &AttributePath::new("provision_start_ip"),
            network.provision_start_ip.clone(),
        );
        let _ = state.set_string(
            &AttributePath::new("provision_end_ip"),
            network.provision_end_ip.clone(),
        );
        let _ = state.set_string(&AttributePath::new("gateway"), network.gateway.clone());
        let _ = state.set_list(
            &AttributePath::new("resolvers"),
            network
                .resolvers
                .iter()
                .map(|r| Dynamic::String(r.clone()))
                .collect(),
        );
        let _ = state.set_map(
            &AttributePath::new("routes"),
            network
                .routes
                .iter()
                .map(|(cidr, gw)| (cidr.clone(), Dynamic::String(gw.clone())))
                .collect(),
        );
        let _ = state.set_bool(&AttributePath::new("internet_nat"), network.internet_nat);
        let _ = state.set_number(&AttributePath::new("vlan_id"), vlan_id as f64);
        state
    }

    fn ids_from_state(state: &DynamicValue) -> Option<(i64, String)> {
        let vlan_id = state.get_number(&AttributePath::new("vlan_id")).ok()? as i64;
        let id = state.get_string(&AttributePath::new("id")).ok()?;
        Some((vlan_id, id))
    }
}

#[async_trait]
impl Resource for FabricResource {
    fn type_name(&self) -> &str {
        "triton_fabric"
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

        let (vlan_id, input) = match Self::extract_input(&request.config) {
            Ok(extracted) => extracted,
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
            .create_fabric_network(vlan_id, &input)
            .await
        {
            Ok(network) => CreateResourceResponse {
                new_state: Self::network_to_state(vlan_id, &network),
                diagnostics,
            },
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to create fabric network",
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

        let Some((vlan_id, id)) = Self::ids_from_state(&request.current_state) else {
            return ReadResourceResponse {
                new_state: None,
                diagnostics,
            };
        };

        match provider_data
            .client
            .network()
            .get_fabric_network(vlan_id, &id)
            .await
        {
            Ok(network) => ReadResourceResponse {
                new_state: Some(Self::network_to_state(vlan_id, &network)),
                diagnostics,
            },
            Err(e) if e.is_not_found() => ReadResourceResponse {
                new_state: None,
                diagnostics,
            },
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to read fabric network",
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
        // Every configurable attribute forces replacement
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

        let Some((vlan_id, id)) = Self::ids_from_state(&request.prior_state) else {
            return DeleteResourceResponse { diagnostics };
        };

        let network = provider_data.client.network();
        let result = retry_on_predicate(
            &RetryPolicy::default(),
            |e: &ApiError| e.is_invalid_argument(),
            || network.delete_fabric_network(vlan_id, &id),
        )
        .await;

        match result {
            Ok(()) => DeleteResourceResponse { diagnostics },
            Err(RetryError::Operation(e)) | Err(RetryError::Timeout { last: e, .. }) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to delete fabric network",
                    format!("API error: {}", e),
                ));
                DeleteResourceResponse { diagnostics }
            }
        }
    }
}

#[async_trait]
impl ResourceWithConfigure for FabricResource {
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
impl ResourceWithImportState for FabricResource {
    /// Import IDs take the form `"<vlan_id>.<network_id>"`
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
            AttributePath::new("vlan_id"),
            AttributePath::new("id"),
            &request,
            &mut response,
        );

        // vlan_id is numeric in state; the split leaves it a string
        if let Some(imported) = response.imported_resources.first_mut() {
            if let Ok(raw) = imported.state.get_string(&AttributePath::new("vlan_id")) {
                match raw.parse::<i64>() {
                    Ok(vlan_id) => {
                        let _ = imported
                            .state
                            .set_number(&AttributePath::new("vlan_id"), vlan_id as f64);
                    }
                    Err(_) => {
                        response.imported_resources.clear();
                        response.diagnostics.push(Diagnostic::error(
                            "Invalid import ID",
                            format!(
                                "Expected an ID of the form \"<vlan_id>.<network_id>\", got '{}'",
                                request.id
                            ),
                        ));
                    }
                }
            }
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Client;

    fn test_resource(server_url: &str) -> FabricResource {
        let client = Client::new(server_url, "demo", "aa:bb", false).unwrap();
        FabricResource {
            provider_data: Some(TritonProviderData::new(client)),
        }
    }

    #[tokio::test]
    async fn create_builds_state_from_response() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/demo/fabrics/default/vlans/2/networks")
            .with_status(201)
            .with_body(
                r#"{"id": "net-1", "name": "backend-net", "fabric": true,
                    "subnet": "10.50.1.0/24", "provision_start_ip": "10.50.1.5",
                    "provision_end_ip": "10.50.1.250", "gateway": "10.50.1.1",
                    "resolvers": ["8.8.8.8"], "internet_nat": true}"#,
            )
            .create_async()
            .await;

        let resource = test_resource(&server.url());

        let mut config = DynamicValue::empty_object();
        config
            .set_number(&AttributePath::new("vlan_id"), 2.0)
            .unwrap();
        config
            .set_string(&AttributePath::new("name"), "backend-net".to_string())
            .unwrap();
        config
            .set_string(&AttributePath::new("subnet"), "10.50.1.0/24".to_string())
            .unwrap();
        config
            .set_string(
                &AttributePath::new("provision_start_ip"),
                "10.50.1.5".to_string(),
            )
            .unwrap();
        config
            .set_string(
                &AttributePath::new("provision_end_ip"),
                "10.50.1.250".to_string(),
            )
            .unwrap();

        let response = resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: "triton_fabric".to_string(),
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
            "net-1"
        );
        assert_eq!(
            response
                .new_state
                .get_number(&AttributePath::new("vlan_id"))
                .unwrap(),
            2.0
        );
        assert!(response
            .new_state
            .get_bool(&AttributePath::new("fabric"))
            .unwrap());
    }

    #[tokio::test]
    async fn delete_succeeds_and_issues_one_call() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("DELETE", "/demo/fabrics/default/vlans/2/networks/net-1")
            .with_status(204)
            .expect(1)
            .create_async()
            .await;

        let resource = test_resource(&server.url());

        let mut state = DynamicValue::empty_object();
        state
            .set_string(&AttributePath::new("id"), "net-1".to_string())
            .unwrap();
        state
            .set_number(&AttributePath::new("vlan_id"), 2.0)
            .unwrap();

        let response = resource
            .delete(
                Context::new(),
                DeleteResourceRequest {
                    type_name: "triton_fabric".to_string(),
                    prior_state: state,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn delete_does_not_retry_hard_failures() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("DELETE", "/demo/fabrics/default/vlans/2/networks/net-1")
            .with_status(403)
            .with_body(r#"{"code": "NotAuthorized", "message": "nope"}"#)
            .expect(1)
            .create_async()
            .await;

        let resource = test_resource(&server.url());

        let mut state = DynamicValue::empty_object();
        state
            .set_string(&AttributePath::new("id"), "net-1".to_string())
            .unwrap();
        state
            .set_number(&AttributePath::new("vlan_id"), 2.0)
            .unwrap();

        let response = resource
            .delete(
                Context::new(),
                DeleteResourceRequest {
                    type_name: "triton_fabric".to_string(),
                    prior_state: state,
                },
            )
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn import_splits_composite_id() {
        let resource = FabricResource::new();
        let response = resource
            .import_state(
                Context::new(),
                ImportResourceStateRequest {
                    type_name: "triton_fabric".to_string(),
                    id: "2.net-1".to_string(),
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
        let state = &response.imported_resources[0].state;
        assert_eq!(
            state.get_number(&AttributePath::new("vlan_id")).unwrap(),
            2.0
        );
        assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), "net-1");
    }
}
