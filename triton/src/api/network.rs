//! Network, fabric and firewall rule operations

use super::client::Client;
use super::error::ApiError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize)]
pub struct Network {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub fabric: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub subnet: String,
    #[serde(default)]
    pub provision_start_ip: String,
    #[serde(default)]
    pub provision_end_ip: String,
    #[serde(default)]
    pub gateway: String,
    #[serde(default)]
    pub resolvers: Vec<String>,
    #[serde(default)]
    pub routes: HashMap<String, String>,
    #[serde(default)]
    pub internet_nat: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FabricVlan {
    pub vlan_id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct VlanInput {
    pub vlan_id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateFabricNetworkInput {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub subnet: String,
    pub provision_start_ip: String,
    pub provision_end_ip: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub gateway: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resolvers: Vec<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub routes: HashMap<String, String>,
    pub internet_nat: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FirewallRule {
    pub id: String,
    #[serde(default)]
    pub rule: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub global: bool,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct FirewallRuleInput {
    pub rule: String,
    pub enabled: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

pub struct NetworkApi<'a> {
    client: &'a Client,
}

impl<'a> NetworkApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    fn vlans_path(&self) -> String {
        format!("/{}/fabrics/default/vlans", self.client.account())
    }

    pub async fn list_networks(&self) -> Result<Vec<Network>, ApiError> {
        self.client
            .get(&format!("/{}/networks", self.client.account()))
            .await
    }

    pub async fn list_vlans(&self) -> Result<Vec<FabricVlan>, ApiError> {
        self.client.get(&self.vlans_path()).await
    }

    pub async fn create_vlan(&self, input: &VlanInput) -> Result<FabricVlan, ApiError> {
        self.client.post(&self.vlans_path(), input).await
    }

    pub async fn get_vlan(&self, vlan_id: i64) -> Result<FabricVlan, ApiError> {
        self.client
            .get(&format!("{}/{}", self.vlans_path(), vlan_id))
            .await
    }

    pub async fn update_vlan(&self, input: &VlanInput) -> Result<FabricVlan, ApiError> {
        self.client
            .put(&format!("{}/{}", self.vlans_path(), input.vlan_id), input)
            .await
    }

    pub async fn delete_vlan(&self, vlan_id: i64) -> Result<(), ApiError> {
        self.client
            .delete(&format!("{}/{}", self.vlans_path(), vlan_id))
            .await
    }

    pub async fn list_fabric_networks(&self, vlan_id: i64) -> Result<Vec<Network>, ApiError> {
        self.client
            .get(&format!("{}/{}/networks", self.vlans_path(), vlan_id))
            .await
    }

    pub async fn create_fabric_network(
        &self,
        vlan_id: i64,
        input: &CreateFabricNetworkInput,
    ) -> Result<Network, ApiError> {
        self.client
            .post(&format!("{}/{}/networks", self.vlans_path(), vlan_id), input)
            .await
    }

    pub async fn get_fabric_network(&self, vlan_id: i64, id: &str) -> Result<Network, ApiError> {
        self.client
            .get(&format!("{}/{}/networks/{}", self.vlans_path(), vlan_id, id))
            .await
    }

    pub async fn delete_fabric_network(&self, vlan_id: i64, id: &str) -> Result<(), ApiError> {
        self.client
            .delete(&format!("{}/{}/networks/{}", self.vlans_path(), vlan_id, id))
            .await
    }

    pub async fn create_firewall_rule(
        &self,
        input: &FirewallRuleInput,
    ) -> Result<FirewallRule, ApiError> {
        self.client
            .post(&format!("/{}/fwrules", self.client.account()), input)
            .await
    }

    pub async fn get_firewall_rule(&self, id: &str) -> Result<FirewallRule, ApiError> {
        self.client
            .get(&format!("/{}/fwrules/{}", self.client.account(), id))
            .await
    }

    pub async fn update_firewall_rule(
        &self,
        id: &str,
        input: &FirewallRuleInput,
    ) -> Result<FirewallRule, ApiError> {
        self.client
            .post(&format!("/{}/fwrules/{}", self.client.account(), id), input)
            .await
    }

    pub async fn delete_firewall_rule(&self, id: &str) -> Result<(), ApiError> {
        self.client
            .delete(&format!("/{}/fwrules/{}", self.client.account(), id))
            .await
    }
}
