//! Provider trait and related types
//!
//! A provider owns its configuration schema, turns validated config into
//! shared provider data, and hands out factories for its resources and
//! data sources.

use crate::context::Context;
use crate::data_source::DataSourceWithConfigure;
use crate::resource::ResourceWithConfigure;
use crate::schema::Schema;
use crate::types::{Diagnostic, DynamicValue};
use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// Factory producing an unconfigured resource; configure is called on it
/// immediately afterwards with the provider data
pub type ResourceFactory = Box<dyn Fn() -> Box<dyn ResourceWithConfigure> + Send + Sync>;

/// Factory producing an unconfigured data source
pub type DataSourceFactory = Box<dyn Fn() -> Box<dyn DataSourceWithConfigure> + Send + Sync>;

#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider type name (e.g., "triton")
    fn type_name(&self) -> &str;

    /// Called to get the provider configuration schema
    async fn schema(&self, ctx: Context, request: ProviderSchemaRequest) -> ProviderSchemaResponse;

    /// Called during plan to validate provider configuration
    /// All problems are reported together, not one at a time
    async fn validate(
        &self,
        ctx: Context,
        request: ValidateProviderConfigRequest,
    ) -> ValidateProviderConfigResponse;

    /// Called once before any resource or data source operation
    /// Builds the shared provider data handed to configure() on each
    async fn configure(
        &mut self,
        ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse;

    /// Resource factories keyed by type name
    fn resources(&self) -> HashMap<String, ResourceFactory>;

    /// Data source factories keyed by type name
    fn data_sources(&self) -> HashMap<String, DataSourceFactory>;
}

// Request/Response Types

pub struct ProviderSchemaRequest;

pub struct ProviderSchemaResponse {
    pub schema: Schema,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct ValidateProviderConfigRequest {
    pub config: DynamicValue,
}

pub struct ValidateProviderConfigResponse {
    pub diagnostics: Vec<Diagnostic>,
}

pub struct ConfigureProviderRequest {
    pub config: DynamicValue,
}

pub struct ConfigureProviderResponse {
    /// Handed to every resource and data source via their configure call
    pub provider_data: Option<Arc<dyn Any + Send + Sync>>,
    pub diagnostics: Vec<Diagnostic>,
}
