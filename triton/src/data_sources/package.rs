//! Package data source
//!
//! Filters the package listing client-side; the name filter is a
//! substring match so families like "g4-highcpu" can be narrowed by the
//! numeric filters. Ambiguous queries fail and name the candidates.

use crate::api::compute::Package;
use crate::provider_data::TritonProviderData;
use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse, ValidateDataSourceConfigRequest, ValidateDataSourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};

#[derive(Debug, Default)]
struct PackageFilter {
    name: Option<String>,
    memory: Option<i64>,
    disk: Option<i64>,
    swap: Option<i64>,
    lwps: Option<i64>,
    vcpus: Option<i64>,
    version: Option<String>,
    group: Option<String>,
}

impl PackageFilter {
    fn matches(&self, package: &Package) -> bool {
        if let Some(name) = &self.name {
            if !package.name.contains(name.as_str()) {
                return false;
            }
        }
        if let Some(version) = &self.version {
            if package.version != *version {
                return false;
            }
        }
        if let Some(group) = &self.group {
            if package.group != *group {
                return false;
            }
        }
        for (want, have) in [
            (self.memory, package.memory),
            (self.disk, package.disk),
            (self.swap, package.swap),
            (self.lwps, package.lwps),
            (self.vcpus, package.vcpus),
        ] {
            if let Some(want) = want {
                if want != have {
                    return false;
                }
            }
        }
        true
    }
}

#[derive(Default)]
pub struct PackageDataSource {
    provider_data: Option<TritonProviderData>,
}

impl PackageDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn data_source_schema() -> Schema {
        SchemaBuilder::new()
            .version(1)
            .description("Looks up a single package")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("Package UUID")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Substring of the package name to filter on")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("memory", AttributeType::Number)
                    .description("RAM in MiB to filter on")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("disk", AttributeType::Number)
                    .description("Disk in MiB to filter on")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("swap", AttributeType::Number)
                    .description("Swap in MiB to filter on")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("lwps", AttributeType::Number)
                    .description("Lightweight process limit to filter on")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("vcpus", AttributeType::Number)
                    .description("Virtual CPU count to filter on")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("version", AttributeType::String)
                    .description("Package version to filter on")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("group", AttributeType::String)
                    .description("Package group to filter on")
                    .optional()
                    .computed()
                    .build(),
            )
            .build()
    }

    fn extract_filter(config: &DynamicValue) -> Result<PackageFilter, Diagnostic> {
        let get_string = |attr: &str| -> Result<Option<String>, Diagnostic> {
            config
                .get_string_opt(&AttributePath::new(attr))
                .map_err(|e| Diagnostic::error(format!("Invalid {}", attr), e.to_string()))
        };
        let get_number = |attr: &str| -> Result<Option<i64>, Diagnostic> {
            Ok(config
                .get_number_opt(&AttributePath::new(attr))
                .map_err(|e| Diagnostic::error(format!("Invalid {}", attr), e.to_string()))?
                .map(|n| n as i64))
        };

        Ok(PackageFilter {
            name: get_string("name")?,
            memory: get_number("memory")?,
            disk: get_number("disk")?,
            swap: get_number("swap")?,
            lwps: get_number("lwps")?,
            vcpus: get_number("vcpus")?,
            version: get_string("version")?,
            group: get_string("group")?,
        })
    }

    fn package_to_state(package: &Package) -> DynamicValue {
        let mut state = DynamicValue::empty_object();
        let _ = state.set_string(&AttributePath::new("id"), package.id.clone());
        let _ = state.set_string(&AttributePath::new("name"), package.name.clone());
        let _ = state.set_number(&AttributePath::new("memory"), package.memory as f64);
        let _ = state.set_number(&AttributePath::new("disk"), package.disk as f64);
        let _ = state.set_number(&AttributePath::new("swap"), package.swap as f64);
        let _ = state.set_number(&AttributePath::new("lwps"), package.lwps as f64);
        let _ = state.set_number(&AttributePath::new("vcpus"), package.vcpus as f64);
        let _ = state.set_string(&AttributePath::new("version"), package.version.clone());
        let _ = state.set_string(&AttributePath::new("group"), package.group.clone());
        state
    }
}

#[async_trait]
impl DataSource for PackageDataSource {
    fn type_name(&self) -> &str {
        "triton_package"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        DataSourceSchemaResponse {
            schema: Self::data_source_schema(),
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateDataSourceConfigRequest,
    ) -> ValidateDataSourceConfigResponse {
        ValidateDataSourceConfigResponse {
            diagnostics: Self::data_source_schema().validate_config(&request.config),
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let mut diagnostics = vec![];
        let state = DynamicValue::empty_object();

        let provider_data = match &self.provider_data {
            Some(data) => data,
            None => {
                diagnostics.push(Diagnostic::error(
                    "Provider not configured",
                    "Provider data was not properly configured",
                ));
                return ReadDataSourceResponse { state, diagnostics };
            }
        };

        let filter = match Self::extract_filter(&request.config) {
            Ok(filter) => filter,
            Err(diag) => {
                diagnostics.push(diag);
                return ReadDataSourceResponse { state, diagnostics };
            }
        };

        let packages = match provider_data.client.compute().list_packages().await {
            Ok(packages) => packages,
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to list packages",
                    format!("API error: {}", e),
                ));
                return ReadDataSourceResponse { state, diagnostics };
            }
        };

        let matches: Vec<&Package> = packages.iter().filter(|p| filter.matches(p)).collect();
        match matches.as_slice() {
            [] => {
                diagnostics.push(Diagnostic::error(
                    "No matching package",
                    "Your query returned no results. Please change your search criteria and try again.",
                ));
                ReadDataSourceResponse { state, diagnostics }
            }
            [package] => ReadDataSourceResponse {
                state: Self::package_to_state(package),
                diagnostics,
            },
            candidates => {
                let names: Vec<&str> = candidates.iter().map(|p| p.name.as_str()).collect();
                diagnostics.push(Diagnostic::error(
                    "Ambiguous package query",
                    format!(
                        "Your query returned more than one result: {}. Please try a more specific search criteria.",
                        names.join(", ")
                    ),
                ));
                ReadDataSourceResponse { state, diagnostics }
            }
        }
    }
}

#[async_trait]
impl DataSourceWithConfigure for PackageDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
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
                "No provider data was provided to the data source",
            ));
        }

        ConfigureDataSourceResponse { diagnostics }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Client;

    fn package(id: &str, name: &str, memory: i64) -> Package {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "name": name,
            "memory": memory,
        }))
        .unwrap()
    }

    #[test]
    fn name_filter_is_substring_match() {
        let filter = PackageFilter {
            name: Some("highcpu".to_string()),
            ..Default::default()
        };

        assert!(filter.matches(&package("p1", "g4-highcpu-1G", 1024)));
        assert!(!filter.matches(&package("p2", "g4-general-4G", 4096)));
    }

    #[test]
    fn numeric_filters_are_exact() {
        let filter = PackageFilter {
            name: Some("highcpu".to_string()),
            memory: Some(2048),
            ..Default::default()
        };

        assert!(!filter.matches(&package("p1", "g4-highcpu-1G", 1024)));
        assert!(filter.matches(&package("p2", "g4-highcpu-2G", 2048)));
    }

    #[tokio::test]
    async fn ambiguous_query_names_candidates() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/demo/packages")
            .with_status(200)
            .with_body(
                r#"[{"id": "p1", "name": "g4-highcpu-1G", "memory": 1024},
                    {"id": "p2", "name": "g4-highcpu-2G", "memory": 2048}]"#,
            )
            .create_async()
            .await;

        let client = Client::new(&server.url(), "demo", "aa:bb", false).unwrap();
        let data_source = PackageDataSource {
            provider_data: Some(TritonProviderData::new(client)),
        };

        let mut config = DynamicValue::empty_object();
        config
            .set_string(&AttributePath::new("name"), "highcpu".to_string())
            .unwrap();

        let response = data_source
            .read(
                Context::new(),
                ReadDataSourceRequest {
                    type_name: "triton_package".to_string(),
                    config,
                },
            )
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert!(response.diagnostics[0].detail.contains("g4-highcpu-1G"));
        assert!(response.diagnostics[0].detail.contains("g4-highcpu-2G"));
    }
}
