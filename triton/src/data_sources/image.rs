//! Image data source
//!
//! Filters the image catalog down to exactly one image. `most_recent`
//! breaks ties by publication date instead of failing on multiple
//! matches.

use crate::api::compute::{Image, ListImagesInput};
use crate::provider_data::TritonProviderData;
use async_trait::async_trait;
use chrono::DateTime;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse, ValidateDataSourceConfigRequest, ValidateDataSourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};

#[derive(Default)]
pub struct ImageDataSource {
    provider_data: Option<TritonProviderData>,
}

impl ImageDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn data_source_schema() -> Schema {
        SchemaBuilder::new()
            .version(1)
            .description("Looks up a single image from the catalog")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("Image UUID")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Image name to filter on")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("os", AttributeType::String)
                    .description("Operating system to filter on")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("version", AttributeType::String)
                    .description("Image version to filter on")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("public", AttributeType::Bool)
                    .description("Filter on public or private images")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("state", AttributeType::String)
                    .description("Image state to filter on")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("owner", AttributeType::String)
                    .description("Owning account UUID to filter on")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("type", AttributeType::String)
                    .description("Image type to filter on")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("most_recent", AttributeType::Bool)
                    .description("Pick the most recently published image when several match")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("published_at", AttributeType::String)
                    .description("Publication timestamp of the matched image")
                    .computed()
                    .build(),
            )
            .build()
    }

    fn extract_filter(config: &DynamicValue) -> Result<(ListImagesInput, bool), Diagnostic> {
        let get = |attr: &str| -> Result<Option<String>, Diagnostic> {
            config
                .get_string_opt(&AttributePath::new(attr))
                .map_err(|e| Diagnostic::error(format!("Invalid {}", attr), e.to_string()))
        };

        let input = ListImagesInput {
            name: get("name")?,
            os: get("os")?,
            version: get("version")?,
            public: config
                .get_bool_opt(&AttributePath::new("public"))
                .map_err(|e| Diagnostic::error("Invalid public", e.to_string()))?,
            state: get("state")?,
            owner: get("owner")?,
            type_: get("type")?,
        };
        let most_recent = config
            .get_bool_opt(&AttributePath::new("most_recent"))
            .map_err(|e| Diagnostic::error("Invalid most_recent", e.to_string()))?
            .unwrap_or(false);

        Ok((input, most_recent))
    }

    fn image_to_state(image: &Image) -> DynamicValue {
        let mut state = DynamicValue::empty_object();
        let _ = state.set_string(&AttributePath::new("id"), image.id.clone());
        let _ = state.set_string(&AttributePath::new("name"), image.name.clone());
        let _ = state.set_string(&AttributePath::new("os"), image.os.clone());
        let _ = state.set_string(&AttributePath::new("version"), image.version.clone());
        let _ = state.set_string(&AttributePath::new("type"), image.type_.clone());
        let _ = state.set_string(&AttributePath::new("state"), image.state.clone());
        let _ = state.set_string(&AttributePath::new("owner"), image.owner.clone());
        let _ = state.set_bool(&AttributePath::new("public"), image.public);
        if let Some(published_at) = &image.published_at {
            let _ = state.set_string(&AttributePath::new("published_at"), published_at.clone());
        }
        state
    }
}

/// Latest image by published_at; images without a parsable timestamp sort
/// first and so never win
fn most_recent_image(images: Vec<Image>) -> Option<Image> {
    images.into_iter().max_by_key(|image| {
        image
            .published_at
            .as_deref()
            .and_then(|p| DateTime::parse_from_rfc3339(p).ok())
    })
}

#[async_trait]
impl DataSource for ImageDataSource {
    fn type_name(&self) -> &str {
        "triton_image"
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

        let (input, most_recent) = match Self::extract_filter(&request.config) {
            Ok(filter) => filter,
            Err(diag) => {
                diagnostics.push(diag);
                return ReadDataSourceResponse { state, diagnostics };
            }
        };

        let images = match provider_data.client.compute().list_images(&input).await {
            Ok(images) => images,
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to list images",
                    format!("API error: {}", e),
                ));
                return ReadDataSourceResponse { state, diagnostics };
            }
        };

        let image = match (images.len(), most_recent) {
            (0, _) => {
                diagnostics.push(Diagnostic::error(
                    "No matching image",
                    "Your query returned no results. Please change your search criteria and try again.",
                ));
                return ReadDataSourceResponse { state, diagnostics };
            }
            (1, _) => images.into_iter().next(),
            (_, true) => most_recent_image(images),
            (_, false) => {
                diagnostics.push(Diagnostic::error(
                    "Ambiguous image query",
                    "Your query returned more than one result. Please try a more specific search criteria, or set most_recent to choose the newest image.",
                ));
                return ReadDataSourceResponse { state, diagnostics };
            }
        };

        match image {
            Some(image) => ReadDataSourceResponse {
                state: Self::image_to_state(&image),
                diagnostics,
            },
            None => {
                diagnostics.push(Diagnostic::error(
                    "No matching image",
                    "Your query returned no results. Please change your search criteria and try again.",
                ));
                ReadDataSourceResponse { state, diagnostics }
            }
        }
    }
}

#[async_trait]
impl DataSourceWithConfigure for ImageDataSource {
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
