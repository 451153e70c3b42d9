//! Triton Service Group operations
//!
//! TSG endpoints live under /v1/tsg and are not account-scoped like the
//! rest of CloudAPI.

use super::client::Client;
use super::error::ApiError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceGroup {
    pub id: i64,
    #[serde(default)]
    pub group_name: String,
    #[serde(default)]
    pub template_id: i64,
    #[serde(default)]
    pub capacity: i64,
    #[serde(default)]
    pub health_check_interval: i64,
}

#[derive(Debug, Serialize)]
pub struct CreateGroupInput {
    pub group_name: String,
    pub template_id: i64,
    pub capacity: i64,
    pub health_check_interval: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstanceTemplate {
    pub id: String,
    #[serde(default)]
    pub template_name: String,
    #[serde(default)]
    pub package: String,
    #[serde(default)]
    pub image_id: String,
    #[serde(default)]
    pub firewall_enabled: bool,
    #[serde(default)]
    pub networks: Vec<String>,
    #[serde(default)]
    pub userdata: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

#[derive(Debug, Default, Serialize)]
pub struct CreateTemplateInput {
    pub template_name: String,
    pub package: String,
    pub image_id: String,
    pub firewall_enabled: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub userdata: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub tags: HashMap<String, String>,
}

pub struct ServicesApi<'a> {
    client: &'a Client,
}

impl<'a> ServicesApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn create_group(&self, input: &CreateGroupInput) -> Result<(), ApiError> {
        let _: serde_json::Value = self.client.post("/v1/tsg/groups", input).await?;
        Ok(())
    }

    /// Accepts a group name or numeric id
    pub async fn get_group(&self, identifier: &str) -> Result<ServiceGroup, ApiError> {
        self.client
            .get(&format!("/v1/tsg/groups/{}", identifier))
            .await
    }

    pub async fn delete_group(&self, identifier: &str) -> Result<(), ApiError> {
        self.client
            .delete(&format!("/v1/tsg/groups/{}", identifier))
            .await
    }

    pub async fn create_template(
        &self,
        input: &CreateTemplateInput,
    ) -> Result<InstanceTemplate, ApiError> {
        self.client.post("/v1/tsg/templates", input).await
    }

    pub async fn get_template(&self, id: &str) -> Result<InstanceTemplate, ApiError> {
        self.client.get(&format!("/v1/tsg/templates/{}", id)).await
    }

    pub async fn delete_template(&self, id: &str) -> Result<(), ApiError> {
        self.client
            .delete(&format!("/v1/tsg/templates/{}", id))
            .await
    }
}
