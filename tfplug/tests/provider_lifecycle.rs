//! End-to-end exercise of the provider surface: configure hands shared
//! data to factory-built resources and data sources, and a resource
//! carries state through create, read, update and delete.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse, ValidateDataSourceConfigRequest, ValidateDataSourceConfigResponse,
};
use tfplug::provider::{
    ConfigureProviderRequest, ConfigureProviderResponse, DataSourceFactory, Provider,
    ProviderSchemaRequest, ProviderSchemaResponse, ResourceFactory, ValidateProviderConfigRequest,
    ValidateProviderConfigResponse,
};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, UpdateResourceRequest, UpdateResourceResponse,
    ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};
use tokio::sync::Mutex;

/// Shared store standing in for a real API client
#[derive(Clone, Default)]
struct MemoryStore {
    items: Arc<Mutex<HashMap<String, String>>>,
}

#[derive(Default)]
struct ItemResource {
    store: Option<MemoryStore>,
}

impl ItemResource {
    fn resource_schema() -> Schema {
        SchemaBuilder::new()
            .version(1)
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("value", AttributeType::String)
                    .required()
                    .build(),
            )
            .build()
    }

    fn item_state(name: &str, value: &str) -> DynamicValue {
        let mut state = DynamicValue::empty_object();
        let _ = state.set_string(&AttributePath::new("id"), name.to_string());
        let _ = state.set_string(&AttributePath::new("name"), name.to_string());
        let _ = state.set_string(&AttributePath::new("value"), value.to_string());
        state
    }
}

#[async_trait]
impl Resource for ItemResource {
    fn type_name(&self) -> &str {
        "memory_item"
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
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

    async fn create(&self, _ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let store = self.store.as_ref().unwrap();
        let name = request
            .config
            .get_string(&AttributePath::new("name"))
            .unwrap();
        let value = request
            .config
            .get_string(&AttributePath::new("value"))
            .unwrap();

        store.items.lock().await.insert(name.clone(), value.clone());

        CreateResourceResponse {
            new_state: Self::item_state(&name, &value),
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let store = self.store.as_ref().unwrap();
        let name = request
            .current_state
            .get_string(&AttributePath::new("name"))
            .unwrap();

        ReadResourceResponse {
            new_state: store
                .items
                .lock()
                .await
                .get(&name)
                .map(|value| Self::item_state(&name, value)),
            diagnostics: vec![],
        }
    }

    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let store = self.store.as_ref().unwrap();
        let name = request
            .planned_state
            .get_string(&AttributePath::new("name"))
            .unwrap();
        let value = request
            .planned_state
            .get_string(&AttributePath::new("value"))
            .unwrap();

        store.items.lock().await.insert(name.clone(), value.clone());

        UpdateResourceResponse {
            new_state: Self::item_state(&name, &value),
            diagnostics: vec![],
        }
    }

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let store = self.store.as_ref().unwrap();
        let name = request
            .prior_state
            .get_string(&AttributePath::new("name"))
            .unwrap();

        store.items.lock().await.remove(&name);

        DeleteResourceResponse {
            diagnostics: vec![],
        }
    }
}

#[async_trait]
impl ResourceWithConfigure for ItemResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        let mut diagnostics = vec![];

        match request
            .provider_data
            .as_ref()
            .and_then(|data| data.downcast_ref::<MemoryStore>())
        {
            Some(store) => self.store = Some(store.clone()),
            None => diagnostics.push(Diagnostic::error(
                "Invalid provider data",
                "Expected the provider's shared store",
            )),
        }

        ConfigureResourceResponse { diagnostics }
    }
}

#[derive(Default)]
struct ItemCountDataSource {
    store: Option<MemoryStore>,
}

#[async_trait]
impl DataSource for ItemCountDataSource {
    fn type_name(&self) -> &str {
        "memory_item_count"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        DataSourceSchemaResponse {
            schema: SchemaBuilder::new()
                .version(1)
                .attribute(
                    AttributeBuilder::new("count", AttributeType::Number)
                        .computed()
                        .build(),
                )
                .build(),
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        _request: ValidateDataSourceConfigRequest,
    ) -> ValidateDataSourceConfigResponse {
        ValidateDataSourceConfigResponse {
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, _request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let store = self.store.as_ref().unwrap();
        let count = store.items.lock().await.len();

        let mut state = DynamicValue::empty_object();
        let _ = state.set_number(&AttributePath::new("count"), count as f64);

        ReadDataSourceResponse {
            state,
            diagnostics: vec![],
        }
    }
}

#[async_trait]
impl DataSourceWithConfigure for ItemCountDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        let mut diagnostics = vec![];

        match request
            .provider_data
            .as_ref()
            .and_then(|data| data.downcast_ref::<MemoryStore>())
        {
            Some(store) => self.store = Some(store.clone()),
            None => diagnostics.push(Diagnostic::error(
                "Invalid provider data",
                "Expected the provider's shared store",
            )),
        }

        ConfigureDataSourceResponse { diagnostics }
    }
}

#[derive(Default)]
struct MemoryProvider;

#[async_trait]
impl Provider for MemoryProvider {
    fn type_name(&self) -> &str {
        "memory"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ProviderSchemaRequest,
    ) -> ProviderSchemaResponse {
        ProviderSchemaResponse {
            schema: SchemaBuilder::new().version(1).build(),
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        _request: ValidateProviderConfigRequest,
    ) -> ValidateProviderConfigResponse {
        ValidateProviderConfigResponse {
            diagnostics: vec![],
        }
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        _request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse {
        ConfigureProviderResponse {
            provider_data: Some(Arc::new(MemoryStore::default())),
            diagnostics: vec![],
        }
    }

    fn resources(&self) -> HashMap<String, ResourceFactory> {
        let mut factories: HashMap<String, ResourceFactory> = HashMap::new();
        factories.insert(
            "memory_item".to_string(),
            Box::new(|| Box::new(ItemResource::default())),
        );
        factories
    }

    fn data_sources(&self) -> HashMap<String, DataSourceFactory> {
        let mut factories: HashMap<String, DataSourceFactory> = HashMap::new();
        factories.insert(
            "memory_item_count".to_string(),
            Box::new(|| Box::new(ItemCountDataSource::default())),
        );
        factories
    }
}

#[tokio::test]
async fn resource_lifecycle_flows_through_provider_data() {
    let mut provider = MemoryProvider;
    let configured = provider
        .configure(
            Context::new(),
            ConfigureProviderRequest {
                config: DynamicValue::empty_object(),
            },
        )
        .await;
    assert!(configured.diagnostics.is_empty());

    let factories = provider.resources();
    let mut resource = factories["memory_item"]();
    let response = resource
        .configure(
            Context::new(),
            ConfigureResourceRequest {
                provider_data: configured.provider_data.clone(),
            },
        )
        .await;
    assert!(response.diagnostics.is_empty());

    let mut config = DynamicValue::empty_object();
    config
        .set_string(&AttributePath::new("name"), "alpha".to_string())
        .unwrap();
    config
        .set_string(&AttributePath::new("value"), "one".to_string())
        .unwrap();

    let created = resource
        .create(
            Context::new(),
            CreateResourceRequest {
                type_name: "memory_item".to_string(),
                planned_state: config.clone(),
                config: config.clone(),
            },
        )
        .await;
    assert!(created.diagnostics.is_empty());
    assert_eq!(
        created
            .new_state
            .get_string(&AttributePath::new("id"))
            .unwrap(),
        "alpha"
    );

    // A second factory instance sees the same store
    let mut reader = factories["memory_item"]();
    reader
        .configure(
            Context::new(),
            ConfigureResourceRequest {
                provider_data: configured.provider_data.clone(),
            },
        )
        .await;
    let read = reader
        .read(
            Context::new(),
            ReadResourceRequest {
                type_name: "memory_item".to_string(),
                current_state: created.new_state.clone(),
            },
        )
        .await;
    assert_eq!(
        read.new_state
            .unwrap()
            .get_string(&AttributePath::new("value"))
            .unwrap(),
        "one"
    );

    let mut planned = created.new_state.clone();
    planned
        .set_string(&AttributePath::new("value"), "two".to_string())
        .unwrap();
    let updated = resource
        .update(
            Context::new(),
            UpdateResourceRequest {
                type_name: "memory_item".to_string(),
                prior_state: created.new_state.clone(),
                planned_state: planned.clone(),
                config: planned,
            },
        )
        .await;
    assert_eq!(
        updated
            .new_state
            .get_string(&AttributePath::new("value"))
            .unwrap(),
        "two"
    );

    resource
        .delete(
            Context::new(),
            DeleteResourceRequest {
                type_name: "memory_item".to_string(),
                prior_state: updated.new_state.clone(),
            },
        )
        .await;

    let gone = resource
        .read(
            Context::new(),
            ReadResourceRequest {
                type_name: "memory_item".to_string(),
                current_state: updated.new_state,
            },
        )
        .await;
    assert!(gone.new_state.is_none());
}

#[tokio::test]
async fn data_source_observes_resource_writes() {
    let mut provider = MemoryProvider;
    let configured = provider
        .configure(
            Context::new(),
            ConfigureProviderRequest {
                config: DynamicValue::empty_object(),
            },
        )
        .await;

    let mut resource = provider.resources()["memory_item"]();
    resource
        .configure(
            Context::new(),
            ConfigureResourceRequest {
                provider_data: configured.provider_data.clone(),
            },
        )
        .await;

    let mut config = DynamicValue::empty_object();
    config
        .set_string(&AttributePath::new("name"), "alpha".to_string())
        .unwrap();
    config
        .set_string(&AttributePath::new("value"), "one".to_string())
        .unwrap();
    resource
        .create(
            Context::new(),
            CreateResourceRequest {
                type_name: "memory_item".to_string(),
                planned_state: config.clone(),
                config,
            },
        )
        .await;

    let mut data_source = provider.data_sources()["memory_item_count"]();
    data_source
        .configure(
            Context::new(),
            ConfigureDataSourceRequest {
                provider_data: configured.provider_data.clone(),
            },
        )
        .await;

    let read = data_source
        .read(
            Context::new(),
            ReadDataSourceRequest {
                type_name: "memory_item_count".to_string(),
                config: DynamicValue::empty_object(),
            },
        )
        .await;
    assert_eq!(
        read.state
            .get_number(&AttributePath::new("count"))
            .unwrap(),
        1.0
    );

    let mut missing_data = provider.data_sources()["memory_item_count"]();
    let response = missing_data
        .configure(
            Context::new(),
            ConfigureDataSourceRequest {
                provider_data: None,
            },
        )
        .await;
    assert_eq!(response.diagnostics.len(), 1);
}
