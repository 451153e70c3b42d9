//! tfplug - Terraform Plugin Framework for Rust
//!
//! A framework for building Terraform providers in Rust. The wire protocol
//! is handled by the plugin host; this crate provides the typed surface a
//! provider implements: schemas, dynamic values, the provider/resource/data
//! source traits, and the retry and state-convergence helpers long-running
//! cloud operations need.

// Core modules
pub mod context;
pub mod error;
pub mod schema;
pub mod types;

// Provider API modules
pub mod data_source;
pub mod provider;
pub mod resource;

// Helper modules
pub mod import;
pub mod retry;
pub mod validator;
pub mod wait;

// Re-exports for convenience
pub use context::Context;
pub use data_source::{DataSource, DataSourceWithConfigure};
pub use error::{Result, TfplugError};
pub use import::{import_state_composite_id, import_state_passthrough_id};
pub use provider::{DataSourceFactory, Provider, ResourceFactory};
pub use resource::{Resource, ResourceWithConfigure, ResourceWithImportState};
pub use retry::{retry_on_predicate, RetryError, RetryPolicy};
pub use schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
pub use types::{Diagnostic, DiagnosticSeverity, Dynamic, DynamicValue};
pub use wait::{wait_for, StateChangeConf, WaitError};
