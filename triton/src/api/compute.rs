//! Instance, snapshot, image, package and datacenter operations

use super::client::Client;
use super::error::ApiError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize)]
pub struct Instance {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub type_: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub image: String,
    #[serde(rename = "package", default)]
    pub package: String,
    #[serde(default)]
    pub memory: i64,
    #[serde(default)]
    pub disk: i64,
    #[serde(default)]
    pub ips: Vec<String>,
    #[serde(rename = "primaryIp", default)]
    pub primary_ip: String,
    #[serde(default)]
    pub firewall_enabled: bool,
    #[serde(default)]
    pub compute_node: String,
    #[serde(default)]
    pub dns_names: Vec<String>,
    #[serde(default)]
    pub tags: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub updated: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Nic {
    pub mac: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub netmask: String,
    #[serde(default)]
    pub gateway: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub network: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Locality {
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub strict: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub near: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub far: Vec<String>,
}

/// Inputs for provisioning an instance. Metadata and tag entries are
/// flattened into `metadata.<key>` / `tag.<key>` body fields, the form
/// CloudAPI expects.
#[derive(Debug, Clone, Default)]
pub struct CreateInstanceInput {
    pub name: Option<String>,
    pub package: String,
    pub image: String,
    pub networks: Vec<String>,
    pub affinity: Vec<String>,
    pub locality: Option<Locality>,
    pub metadata: HashMap<String, String>,
    pub tags: HashMap<String, String>,
    pub firewall_enabled: bool,
}

impl CreateInstanceInput {
    fn to_body(&self) -> serde_json::Value {
        let mut body = serde_json::Map::new();

        if let Some(name) = &self.name {
            body.insert("name".to_string(), serde_json::json!(name));
        }
        body.insert("package".to_string(), serde_json::json!(self.package));
        body.insert("image".to_string(), serde_json::json!(self.image));
        if !self.networks.is_empty() {
            body.insert("networks".to_string(), serde_json::json!(self.networks));
        }
        if !self.affinity.is_empty() {
            body.insert("affinity".to_string(), serde_json::json!(self.affinity));
        } else if let Some(locality) = &self.locality {
            body.insert("locality".to_string(), serde_json::json!(locality));
        }
        body.insert(
            "firewall_enabled".to_string(),
            serde_json::json!(self.firewall_enabled),
        );
        for (key, value) in &self.metadata {
            body.insert(format!("metadata.{}", key), serde_json::json!(value));
        }
        for (key, value) in &self.tags {
            body.insert(format!("tag.{}", key), serde_json::json!(value));
        }

        serde_json::Value::Object(body)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Snapshot {
    pub name: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub updated: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Image {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub version: String,
    #[serde(rename = "type", default)]
    pub type_: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub published_at: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ListImagesInput {
    pub name: Option<String>,
    pub os: Option<String>,
    pub version: Option<String>,
    pub public: Option<bool>,
    pub state: Option<String>,
    pub owner: Option<String>,
    pub type_: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Package {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub memory: i64,
    #[serde(default)]
    pub disk: i64,
    #[serde(default)]
    pub swap: i64,
    #[serde(default)]
    pub lwps: i64,
    #[serde(default)]
    pub vcpus: i64,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub description: String,
}

pub struct ComputeApi<'a> {
    client: &'a Client,
}

impl<'a> ComputeApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    fn machines_path(&self) -> String {
        format!("/{}/machines", self.client.account())
    }

    pub async fn create_instance(&self, input: &CreateInstanceInput) -> Result<Instance, ApiError> {
        self.client
            .post(&self.machines_path(), &input.to_body())
            .await
    }

    pub async fn get_instance(&self, id: &str) -> Result<Instance, ApiError> {
        self.client
            .get(&format!("{}/{}", self.machines_path(), id))
            .await
    }

    pub async fn delete_instance(&self, id: &str) -> Result<(), ApiError> {
        self.client
            .delete(&format!("{}/{}", self.machines_path(), id))
            .await
    }

    pub async fn rename_instance(&self, id: &str, name: &str) -> Result<(), ApiError> {
        self.client
            .post_action(&format!(
                "{}/{}?action=rename&name={}",
                self.machines_path(),
                id,
                name
            ))
            .await
    }

    pub async fn resize_instance(&self, id: &str, package: &str) -> Result<(), ApiError> {
        self.client
            .post_action(&format!(
                "{}/{}?action=resize&package={}",
                self.machines_path(),
                id,
                package
            ))
            .await
    }

    pub async fn enable_firewall(&self, id: &str) -> Result<(), ApiError> {
        self.client
            .post_action(&format!(
                "{}/{}?action=enable_firewall",
                self.machines_path(),
                id
            ))
            .await
    }

    pub async fn disable_firewall(&self, id: &str) -> Result<(), ApiError> {
        self.client
            .post_action(&format!(
                "{}/{}?action=disable_firewall",
                self.machines_path(),
                id
            ))
            .await
    }

    pub async fn list_nics(&self, id: &str) -> Result<Vec<Nic>, ApiError> {
        self.client
            .get(&format!("{}/{}/nics", self.machines_path(), id))
            .await
    }

    pub async fn add_nic(&self, id: &str, network: &str) -> Result<Nic, ApiError> {
        self.client
            .post(
                &format!("{}/{}/nics", self.machines_path(), id),
                &serde_json::json!({ "network": network }),
            )
            .await
    }

    pub async fn remove_nic(&self, id: &str, mac: &str) -> Result<(), ApiError> {
        self.client
            .delete(&format!("{}/{}/nics/{}", self.machines_path(), id, mac))
            .await
    }

    /// Replaces the full tag set; tags absent from `tags` are removed
    pub async fn replace_tags(
        &self,
        id: &str,
        tags: &HashMap<String, String>,
    ) -> Result<HashMap<String, String>, ApiError> {
        self.client
            .put(&format!("{}/{}/tags", self.machines_path(), id), tags)
            .await
    }

    pub async fn delete_all_tags(&self, id: &str) -> Result<(), ApiError> {
        self.client
            .delete(&format!("{}/{}/tags", self.machines_path(), id))
            .await
    }

    pub async fn get_metadata(&self, id: &str) -> Result<HashMap<String, String>, ApiError> {
        self.client
            .get(&format!("{}/{}/metadata", self.machines_path(), id))
            .await
    }

    /// Merges the given keys into the instance metadata
    pub async fn update_metadata(
        &self,
        id: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<HashMap<String, String>, ApiError> {
        self.client
            .post(&format!("{}/{}/metadata", self.machines_path(), id), metadata)
            .await
    }

    pub async fn delete_metadata_key(&self, id: &str, key: &str) -> Result<(), ApiError> {
        self.client
            .delete(&format!("{}/{}/metadata/{}", self.machines_path(), id, key))
            .await
    }

    pub async fn create_snapshot(&self, machine_id: &str, name: &str) -> Result<Snapshot, ApiError> {
        self.client
            .post(
                &format!("{}/{}/snapshots", self.machines_path(), machine_id),
                &serde_json::json!({ "name": name }),
            )
            .await
    }

    pub async fn get_snapshot(&self, machine_id: &str, name: &str) -> Result<Snapshot, ApiError> {
        self.client
            .get(&format!(
                "{}/{}/snapshots/{}",
                self.machines_path(),
                machine_id,
                name
            ))
            .await
    }

    pub async fn delete_snapshot(&self, machine_id: &str, name: &str) -> Result<(), ApiError> {
        self.client
            .delete(&format!(
                "{}/{}/snapshots/{}",
                self.machines_path(),
                machine_id,
                name
            ))
            .await
    }

    pub async fn list_images(&self, input: &ListImagesInput) -> Result<Vec<Image>, ApiError> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(name) = &input.name {
            params.push(("name", name.clone()));
        }
        if let Some(os) = &input.os {
            params.push(("os", os.clone()));
        }
        if let Some(version) = &input.version {
            params.push(("version", version.clone()));
        }
        if let Some(public) = input.public {
            params.push(("public", public.to_string()));
        }
        if let Some(state) = &input.state {
            params.push(("state", state.clone()));
        }
        if let Some(owner) = &input.owner {
            params.push(("owner", owner.clone()));
        }
        if let Some(type_) = &input.type_ {
            params.push(("type", type_.clone()));
        }

        self.client
            .get_query(&format!("/{}/images", self.client.account()), &params)
            .await
    }

    pub async fn list_packages(&self) -> Result<Vec<Package>, ApiError> {
        self.client
            .get(&format!("/{}/packages", self.client.account()))
            .await
    }

    /// Datacenters come back as a name -> endpoint URL object
    pub async fn list_datacenters(&self) -> Result<HashMap<String, String>, ApiError> {
        self.client
            .get(&format!("/{}/datacenters", self.client.account()))
            .await
    }
}
