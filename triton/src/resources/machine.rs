//! Machine (instance) resource
//!
//! The heaviest resource in the provider. Provisioning is asynchronous
//! and every mutation converges server-side after the API call returns,
//! so each update step polls the instance until the change is visible.
//!
//! CNS configuration rides on reserved `triton.cns.*` machine tags. The
//! resource keeps those tags out of the user-facing `tags` attribute and
//! folds them into the `cns` block instead.

use crate::api::compute::{CreateInstanceInput, Instance, Locality, Nic};
use crate::api::error::ApiError;
use crate::provider_data::TritonProviderData;
use crate::resources::{NAME_PATTERN, SLOW_RESOURCE_TIMEOUT};
use async_trait::async_trait;
use futures::FutureExt;
use std::collections::HashMap;
use tfplug::context::Context;
use tfplug::import::import_state_passthrough_id;
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
use tfplug::validator::StringPatternValidator;
use tfplug::wait::{wait_for, StateChangeConf, DEFAULT_POLL_INTERVAL};

const CNS_TAG_PREFIX: &str = "triton.cns.";
const CNS_SERVICES_TAG: &str = "triton.cns.services";
const CNS_DISABLE_TAG: &str = "triton.cns.disable";

/// Attribute name -> metadata key for the metadata arguments that get
/// their own schema attribute
const METADATA_ALIASES: [(&str, &str); 5] = [
    ("administrator_pw", "administrator-pw"),
    ("cloud_config", "cloud-init:user-data"),
    ("root_authorized_keys", "root_authorized_keys"),
    ("user_data", "user-data"),
    ("user_script", "user-script"),
];

#[derive(Debug, Clone, Default, PartialEq)]
struct CnsConfig {
    disable: bool,
    services: Vec<String>,
}

#[derive(Default)]
pub struct MachineResource {
    provider_data: Option<TritonProviderData>,
}

impl MachineResource {
    pub fn new() -> Self {
        Self::default()
    }

    fn cns_attribute_type() -> AttributeType {
        AttributeType::Object(HashMap::from([
            ("disable".to_string(), AttributeType::Bool),
            (
                "services".to_string(),
                AttributeType::List(Box::new(AttributeType::String)),
            ),
        ]))
    }

    fn locality_attribute_type() -> AttributeType {
        AttributeType::Object(HashMap::from([
            (
                "close_to".to_string(),
                AttributeType::List(Box::new(AttributeType::String)),
            ),
            (
                "far_from".to_string(),
                AttributeType::List(Box::new(AttributeType::String)),
            ),
            ("strict".to_string(), AttributeType::Bool),
        ]))
    }

    fn nic_attribute_type() -> AttributeType {
        AttributeType::Object(HashMap::from([
            ("ip".to_string(), AttributeType::String),
            ("mac".to_string(), AttributeType::String),
            ("primary".to_string(), AttributeType::Bool),
            ("netmask".to_string(), AttributeType::String),
            ("gateway".to_string(), AttributeType::String),
            ("state".to_string(), AttributeType::String),
            ("network".to_string(), AttributeType::String),
        ]))
    }

    fn resource_schema() -> Schema {
        SchemaBuilder::new()
            .version(1)
            .description("Manages a Triton machine (instance)")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("Machine UUID")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Friendly name; generated by CloudAPI when omitted")
                    .optional()
                    .computed()
                    .validator(Box::new(StringPatternValidator {
                        pattern: regex::Regex::new(NAME_PATTERN)
                            .expect("static pattern compiles"),
                        description: "a name starting with a letter or digit".to_string(),
                    }))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("type", AttributeType::String)
                    .description("Machine type (smartmachine or virtualmachine)")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("dataset", AttributeType::String)
                    .description("Dataset URN the machine was provisioned from")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("memory", AttributeType::Number)
                    .description("RAM in MiB")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("disk", AttributeType::Number)
                    .description("Disk in MiB")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("ips", AttributeType::List(Box::new(AttributeType::String)))
                    .description("IP addresses assigned to the machine")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("tags", AttributeType::Map(Box::new(AttributeType::String)))
                    .description("Machine tags")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(
                    "cns",
                    AttributeType::List(Box::new(Self::cns_attribute_type())),
                )
                .description("Container Name Service configuration")
                .optional()
                .build(),
            )
            .attribute(
                AttributeBuilder::new(
                    "affinity",
                    AttributeType::List(Box::new(AttributeType::String)),
                )
                .description("Affinity rules steering placement")
                .optional()
                .force_new()
                .build(),
            )
            .attribute(
                AttributeBuilder::new(
                    "locality",
                    AttributeType::List(Box::new(Self::locality_attribute_type())),
                )
                .description("Placement hints; superseded by affinity rules")
                .optional()
                .force_new()
                .build(),
            )
            .attribute(
                AttributeBuilder::new(
                    "metadata",
                    AttributeType::Map(Box::new(AttributeType::String)),
                )
                .description("Machine metadata")
                .optional()
                .computed()
                .build(),
            )
            .attribute(
                AttributeBuilder::new("package", AttributeType::String)
                    .description("Package to provision with; changing it resizes the machine")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("image", AttributeType::String)
                    .description("UUID of the image to provision from")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(
                    "networks",
                    AttributeType::List(Box::new(AttributeType::String)),
                )
                .description("Networks the machine is attached to")
                .optional()
                .computed()
                .build(),
            )
            .attribute(
                AttributeBuilder::new(
                    "nic",
                    AttributeType::List(Box::new(Self::nic_attribute_type())),
                )
                .description("Network interfaces, one object per NIC")
                .computed()
                .build(),
            )
            .attribute(
                AttributeBuilder::new("firewall_enabled", AttributeType::Bool)
                    .description("Whether the cloud firewall applies to this machine")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("root_authorized_keys", AttributeType::String)
                    .description("Authorized keys for the root user")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("user_script", AttributeType::String)
                    .description("Script executed on each boot")
                    .optional()
                    .computed()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("cloud_config", AttributeType::String)
                    .description("Cloud-init user data for Linux brands")
                    .optional()
                    .computed()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("user_data", AttributeType::String)
                    .description("Data copied to the machine on boot")
                    .optional()
                    .computed()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("administrator_pw", AttributeType::String)
                    .description("Administrator password for Windows brands")
                    .optional()
                    .computed()
                    .sensitive()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("created", AttributeType::String)
                    .description("Creation timestamp")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("updated", AttributeType::String)
                    .description("Last update timestamp")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("primaryip", AttributeType::String)
                    .description("Primary IP address")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(
                    "domain_names",
                    AttributeType::List(Box::new(AttributeType::String)),
                )
                .description("CNS domain names pointing at the machine")
                .computed()
                .build(),
            )
            .build()
    }

    fn extract_create_input(config: &DynamicValue) -> Result<CreateInstanceInput, Diagnostic> {
        let name = config
            .get_string_opt(&AttributePath::new("name"))
            .map_err(|e| Diagnostic::error("Invalid name", e.to_string()))?;
        let package = config
            .get_string(&AttributePath::new("package"))
            .map_err(|_| {
                Diagnostic::error("Missing package", "The 'package' attribute is required")
            })?;
        let image = config.get_string(&AttributePath::new("image")).map_err(|_| {
            Diagnostic::error("Missing image", "The 'image' attribute is required")
        })?;
        let networks = string_list(config, "networks")?;
        let affinity = string_list(config, "affinity")?;
        let locality = locality_from_config(config)?;
        let firewall_enabled = config
            .get_bool_opt(&AttributePath::new("firewall_enabled"))
            .map_err(|e| Diagnostic::error("Invalid firewall_enabled", e.to_string()))?
            .unwrap_or(false);

        let metadata = full_metadata_from_config(config)?;

        let mut tags = string_map(config, "tags")?;
        // CNS services land as a reserved tag. The disable flag cannot be
        // set at provision time; CloudAPI rejects it.
        if let Some(cns) = cns_from_config(config)? {
            if !cns.services.is_empty() {
                tags.insert(CNS_SERVICES_TAG.to_string(), cns.services.join(","));
            }
        }

        Ok(CreateInstanceInput {
            name,
            package,
            image,
            networks,
            affinity,
            locality,
            metadata,
            tags,
            firewall_enabled,
        })
    }

    fn instance_to_state(instance: &Instance, nics: &[Nic]) -> DynamicValue {
        let mut state = DynamicValue::empty_object();
        let _ = state.set_string(&AttributePath::new("id"), instance.id.clone());
        let _ = state.set_string(&AttributePath::new("name"), instance.name.clone());
        let _ = state.set_string(&AttributePath::new("type"), instance.type_.clone());
        let _ = state.set_string(&AttributePath::new("dataset"), instance.image.clone());
        let _ = state.set_string(&AttributePath::new("image"), instance.image.clone());
        let _ = state.set_string(&AttributePath::new("package"), instance.package.clone());
        let _ = state.set_number(&AttributePath::new("memory"), instance.memory as f64);
        let _ = state.set_number(&AttributePath::new("disk"), instance.disk as f64);
        let _ = state.set_list(
            &AttributePath::new("ips"),
            instance
                .ips
                .iter()
                .map(|ip| Dynamic::String(ip.clone()))
                .collect(),
        );
        let _ = state.set_bool(
            &AttributePath::new("firewall_enabled"),
            instance.firewall_enabled,
        );
        let _ = state.set_string(&AttributePath::new("created"), instance.created.clone());
        let _ = state.set_string(&AttributePath::new("updated"), instance.updated.clone());
        let _ = state.set_string(&AttributePath::new("primaryip"), instance.primary_ip.clone());
        let _ = state.set_list(
            &AttributePath::new("domain_names"),
            instance
                .dns_names
                .iter()
                .map(|d| Dynamic::String(d.clone()))
                .collect(),
        );

        // Metadata arguments with their own attribute are pulled out of
        // the metadata map so the two never overlap.
        let mut metadata = instance.metadata.clone();
        for (attr, key) in METADATA_ALIASES {
            if let Some(value) = metadata.remove(key) {
                let _ = state.set_string(&AttributePath::new(attr), value);
            }
        }
        let _ = state.set_map(
            &AttributePath::new("metadata"),
            metadata
                .into_iter()
                .map(|(k, v)| (k, Dynamic::String(v)))
                .collect(),
        );

        // Reserved CNS tags become the cns block; everything else is a
        // user tag.
        let mut tags: HashMap<String, Dynamic> = HashMap::new();
        let mut cns = CnsConfig::default();
        let mut has_cns = false;
        for (key, value) in &instance.tags {
            let value = tag_value_to_string(value);
            if key == CNS_SERVICES_TAG {
                cns.services = value.split(',').map(str::to_string).collect();
                has_cns = true;
            } else if key == CNS_DISABLE_TAG {
                cns.disable = value == "true";
                has_cns = true;
            } else if !key.starts_with(CNS_TAG_PREFIX) {
                tags.insert(key.clone(), Dynamic::String(value));
            }
        }
        let _ = state.set_map(&AttributePath::new("tags"), tags);
        if has_cns {
            let mut block: HashMap<String, Dynamic> = HashMap::new();
            block.insert("disable".to_string(), Dynamic::Bool(cns.disable));
            block.insert(
                "services".to_string(),
                Dynamic::List(
                    cns.services
                        .iter()
                        .map(|s| Dynamic::String(s.clone()))
                        .collect(),
                ),
            );
            let _ = state.set_list(&AttributePath::new("cns"), vec![Dynamic::Map(block)]);
        } else {
            let _ = state.set_list(&AttributePath::new("cns"), vec![]);
        }

        let _ = state.set_list(
            &AttributePath::new("networks"),
            nics.iter()
                .map(|nic| Dynamic::String(nic.network.clone()))
                .collect(),
        );
        let _ = state.set_list(
            &AttributePath::new("nic"),
            nics.iter()
                .map(|nic| {
                    let mut entry: HashMap<String, Dynamic> = HashMap::new();
                    entry.insert("mac".to_string(), Dynamic::String(nic.mac.clone()));
                    entry.insert("ip".to_string(), Dynamic::String(nic.ip.clone()));
                    entry.insert("primary".to_string(), Dynamic::Bool(nic.primary));
                    entry.insert("netmask".to_string(), Dynamic::String(nic.netmask.clone()));
                    entry.insert("gateway".to_string(), Dynamic::String(nic.gateway.clone()));
                    entry.insert("state".to_string(), Dynamic::String(nic.state.clone()));
                    entry.insert("network".to_string(), Dynamic::String(nic.network.clone()));
                    Dynamic::Map(entry)
                })
                .collect(),
        );

        state
    }

    /// Carries config-only attributes that CloudAPI never echoes back
    fn carry_over(state: &mut DynamicValue, source: &DynamicValue) {
        for attr in ["affinity", "locality"] {
            if let Ok(Some(value)) = source.get_list_opt(&AttributePath::new(attr)) {
                let _ = state.set_list(&AttributePath::new(attr), value);
            }
        }
    }

    async fn read_state(
        provider_data: &TritonProviderData,
        id: &str,
    ) -> Result<DynamicValue, ApiError> {
        let compute = provider_data.client.compute();
        let instance = compute.get_instance(id).await?;
        let nics = compute.list_nics(id).await?;
        Ok(Self::instance_to_state(&instance, &nics))
    }

    async fn update_name(
        provider_data: &TritonProviderData,
        id: &str,
        new_name: &str,
    ) -> Result<(), Diagnostic> {
        let compute = provider_data.client.compute();
        compute.rename_instance(id, new_name).await.map_err(|e| {
            Diagnostic::error("Failed to rename machine", format!("API error: {}", e))
        })?;

        wait_for(
            "machine name to converge",
            SLOW_RESOURCE_TIMEOUT,
            DEFAULT_POLL_INTERVAL,
            || compute.get_instance(id),
            |instance: &Instance| instance.name == new_name,
        )
        .await
        .map_err(|e| {
            Diagnostic::error(
                "Machine rename did not converge",
                format!("Error waiting for machine '{}' to be renamed: {}", id, e),
            )
        })?;
        Ok(())
    }

    async fn update_tags(
        provider_data: &TritonProviderData,
        id: &str,
        prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> Result<(), Diagnostic> {
        let user_tags = string_map(planned, "tags")?;
        let cns = cns_from_config(planned)?;
        let old_cns = cns_from_config(prior)?.unwrap_or_default();

        let mut desired = user_tags.clone();
        if let Some(cns) = &cns {
            if !cns.services.is_empty() {
                desired.insert(CNS_SERVICES_TAG.to_string(), cns.services.join(","));
            }
            if cns.disable {
                desired.insert(CNS_DISABLE_TAG.to_string(), "true".to_string());
            }
        }

        let compute = provider_data.client.compute();
        if desired.is_empty() {
            match compute.delete_all_tags(id).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    return Err(Diagnostic::error(
                        "Failed to delete machine tags",
                        format!("API error: {}", e),
                    ))
                }
            }
        } else {
            compute.replace_tags(id, &desired).await.map_err(|e| {
                Diagnostic::error("Failed to replace machine tags", format!("API error: {}", e))
            })?;
        }

        let has_cns = cns.is_some();
        let new_cns = cns.unwrap_or_default();
        wait_for(
            "machine tags to converge",
            SLOW_RESOURCE_TIMEOUT,
            DEFAULT_POLL_INTERVAL,
            || compute.get_instance(id),
            |instance: &Instance| {
                tags_converged(&instance.tags, &desired)
                    && has_valid_domain_names(
                        has_cns,
                        new_cns.disable,
                        &old_cns.services,
                        &new_cns.services,
                        &instance.dns_names,
                    )
            },
        )
        .await
        .map_err(|e| {
            Diagnostic::error(
                "Machine tags did not converge",
                format!("Error waiting for tags on machine '{}': {}", id, e),
            )
        })?;
        Ok(())
    }

    async fn update_package(
        provider_data: &TritonProviderData,
        id: &str,
        new_package: &str,
    ) -> Result<(), Diagnostic> {
        let compute = provider_data.client.compute();
        compute.resize_instance(id, new_package).await.map_err(|e| {
            Diagnostic::error("Failed to resize machine", format!("API error: {}", e))
        })?;

        wait_for(
            "machine resize to finish",
            SLOW_RESOURCE_TIMEOUT,
            DEFAULT_POLL_INTERVAL,
            || compute.get_instance(id),
            |instance: &Instance| instance.package == new_package && instance.state == "running",
        )
        .await
        .map_err(|e| {
            Diagnostic::error(
                "Machine resize did not converge",
                format!("Error waiting for machine '{}' to resize: {}", id, e),
            )
        })?;
        Ok(())
    }

    async fn update_firewall(
        provider_data: &TritonProviderData,
        id: &str,
        enabled: bool,
    ) -> Result<(), Diagnostic> {
        let compute = provider_data.client.compute();
        let toggle = if enabled {
            compute.enable_firewall(id).await
        } else {
            compute.disable_firewall(id).await
        };
        toggle.map_err(|e| {
            Diagnostic::error(
                "Failed to toggle machine firewall",
                format!("API error: {}", e),
            )
        })?;

        wait_for(
            "machine firewall state to converge",
            SLOW_RESOURCE_TIMEOUT,
            DEFAULT_POLL_INTERVAL,
            || compute.get_instance(id),
            |instance: &Instance| instance.firewall_enabled == enabled,
        )
        .await
        .map_err(|e| {
            Diagnostic::error(
                "Machine firewall did not converge",
                format!("Error waiting for firewall on machine '{}': {}", id, e),
            )
        })?;
        Ok(())
    }

    async fn update_networks(
        provider_data: &TritonProviderData,
        id: &str,
        old: &[String],
        new: &[String],
    ) -> Result<(), Diagnostic> {
        let compute = provider_data.client.compute();
        let (to_remove, to_add) = diff_networks(old, new);

        // NIC removal needs the MAC, which only a NIC listing reveals.
        let nics = compute.list_nics(id).await.map_err(|e| {
            Diagnostic::error("Failed to list machine NICs", format!("API error: {}", e))
        })?;

        // CloudAPI answers ResourceFound while the instance is mid-change;
        // those errors clear once the previous NIC operation settles.
        let policy = RetryPolicy::default();
        for network in &to_remove {
            let Some(nic) = nics.iter().find(|nic| nic.network == *network) else {
                continue;
            };
            let result = retry_on_predicate(&policy, |e: &ApiError| e.is_resource_found(), || {
                compute.remove_nic(id, &nic.mac)
            })
            .await;
            match result {
                Ok(()) => {}
                Err(RetryError::Operation(e)) if e.is_not_found() => {}
                Err(RetryError::Operation(e)) | Err(RetryError::Timeout { last: e, .. }) => {
                    return Err(Diagnostic::error(
                        "Failed to detach machine NIC",
                        format!("API error removing NIC on network '{}': {}", network, e),
                    ))
                }
            }
        }
        for network in &to_add {
            let result = retry_on_predicate(&policy, |e: &ApiError| e.is_resource_found(), || {
                compute.add_nic(id, network)
            })
            .await;
            match result {
                Ok(_) => {}
                Err(RetryError::Operation(e)) | Err(RetryError::Timeout { last: e, .. }) => {
                    return Err(Diagnostic::error(
                        "Failed to attach machine NIC",
                        format!("API error adding NIC on network '{}': {}", network, e),
                    ))
                }
            }
        }
        Ok(())
    }

    async fn update_metadata(
        provider_data: &TritonProviderData,
        id: &str,
        prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> Result<(), Diagnostic> {
        let old = full_metadata_from_config(prior)?;
        let desired = full_metadata_from_config(planned)?;

        let compute = provider_data.client.compute();
        let removed: Vec<&String> = old.keys().filter(|k| !desired.contains_key(*k)).collect();
        for key in &removed {
            match compute.delete_metadata_key(id, key).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    return Err(Diagnostic::error(
                        "Failed to delete machine metadata key",
                        format!("API error deleting metadata key '{}': {}", key, e),
                    ))
                }
            }
        }

        if !desired.is_empty() {
            compute.update_metadata(id, &desired).await.map_err(|e| {
                Diagnostic::error(
                    "Failed to update machine metadata",
                    format!("API error: {}", e),
                )
            })?;
        }

        wait_for(
            "machine metadata to converge",
            SLOW_RESOURCE_TIMEOUT,
            DEFAULT_POLL_INTERVAL,
            || compute.get_metadata(id),
            |observed: &HashMap<String, String>| {
                desired.iter().all(|(k, v)| observed.get(k) == Some(v))
                    && removed.iter().all(|k| !observed.contains_key(*k))
            },
        )
        .await
        .map_err(|e| {
            Diagnostic::error(
                "Machine metadata did not converge",
                format!("Error waiting for metadata on machine '{}': {}", id, e),
            )
        })?;
        Ok(())
    }
}

fn string_list(config: &DynamicValue, attr: &str) -> Result<Vec<String>, Diagnostic> {
    Ok(config
        .get_list_opt(&AttributePath::new(attr))
        .map_err(|e| Diagnostic::error(format!("Invalid {}", attr), e.to_string()))?
        .unwrap_or_default()
        .into_iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect())
}

fn string_map(config: &DynamicValue, attr: &str) -> Result<HashMap<String, String>, Diagnostic> {
    Ok(config
        .get_map_opt(&AttributePath::new(attr))
        .map_err(|e| Diagnostic::error(format!("Invalid {}", attr), e.to_string()))?
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(k, v)| v.as_str().map(|s| (k, s.to_string())))
        .collect())
}

fn locality_from_config(config: &DynamicValue) -> Result<Option<Locality>, Diagnostic> {
    let Some(blocks) = config
        .get_list_opt(&AttributePath::new("locality"))
        .map_err(|e| Diagnostic::error("Invalid locality", e.to_string()))?
    else {
        return Ok(None);
    };
    let Some(Dynamic::Map(block)) = blocks.into_iter().next() else {
        return Ok(None);
    };

    let pull = |key: &str| -> Vec<String> {
        match block.get(key) {
            Some(Dynamic::List(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => vec![],
        }
    };

    Ok(Some(Locality {
        strict: false,
        near: pull("close_to"),
        far: pull("far_from"),
    }))
}

fn full_metadata_from_config(config: &DynamicValue) -> Result<HashMap<String, String>, Diagnostic> {
    let mut metadata = string_map(config, "metadata")?;
    for (attr, key) in METADATA_ALIASES {
        if let Some(value) = config
            .get_string_opt(&AttributePath::new(attr))
            .map_err(|e| Diagnostic::error(format!("Invalid {}", attr), e.to_string()))?
        {
            metadata.insert(key.to_string(), value);
        }
    }
    Ok(metadata)
}

fn cns_from_config(config: &DynamicValue) -> Result<Option<CnsConfig>, Diagnostic> {
    let Some(blocks) = config
        .get_list_opt(&AttributePath::new("cns"))
        .map_err(|e| Diagnostic::error("Invalid cns", e.to_string()))?
    else {
        return Ok(None);
    };
    let Some(Dynamic::Map(block)) = blocks.into_iter().next() else {
        return Ok(None);
    };

    let disable = matches!(block.get("disable"), Some(Dynamic::Bool(true)));
    let services = match block.get("services") {
        Some(Dynamic::List(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => vec![],
    };

    Ok(Some(CnsConfig { disable, services }))
}

fn tag_value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Compares observed machine tags against the full desired tag set
fn tags_converged(
    observed: &HashMap<String, serde_json::Value>,
    desired: &HashMap<String, String>,
) -> bool {
    observed.len() == desired.len()
        && desired
            .iter()
            .all(|(k, v)| observed.get(k).map(tag_value_to_string).as_ref() == Some(v))
}

/// Set difference in both directions: networks to detach and to attach
fn diff_networks(old: &[String], new: &[String]) -> (Vec<String>, Vec<String>) {
    let to_remove = old
        .iter()
        .filter(|n| !new.contains(n))
        .cloned()
        .collect();
    let to_add = new
        .iter()
        .filter(|n| !old.contains(n))
        .cloned()
        .collect();
    (to_remove, to_add)
}

fn first_labels(domains: &[String]) -> Vec<&str> {
    domains
        .iter()
        .filter_map(|d| d.split('.').next())
        .collect()
}

/// Whether CNS has published a record for every requested service
fn services_published(services: &[String], domains: &[String]) -> bool {
    let labels = first_labels(domains);
    services.iter().all(|s| labels.contains(&s.as_str()))
}

/// Whether the DNS records reflect a CNS configuration change: every new
/// service is published and every dropped service has been withdrawn
fn has_valid_domain_names(
    has_cns: bool,
    disable: bool,
    old_services: &[String],
    new_services: &[String],
    domains: &[String],
) -> bool {
    if !has_cns {
        return !domains.is_empty();
    }
    if disable {
        return domains.is_empty();
    }

    let labels = first_labels(domains);
    let published = new_services.iter().all(|s| labels.contains(&s.as_str()));
    let withdrawn = old_services
        .iter()
        .filter(|s| !new_services.contains(s))
        .all(|s| !labels.contains(&s.as_str()));
    published && withdrawn
}

#[async_trait]
impl Resource for MachineResource {
    fn type_name(&self) -> &str {
        "triton_machine"
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

        let input = match Self::extract_create_input(&request.config) {
            Ok(input) => input,
            Err(diag) => {
                diagnostics.push(diag);
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics,
                };
            }
        };

        // Placement rules are evaluated against live state server-side;
        // concurrent rule-carrying creates race each other.
        let _guard = if input.affinity.is_empty() && input.locality.is_none() {
            None
        } else {
            Some(provider_data.affinity_lock.lock().await)
        };

        let compute = provider_data.client.compute();
        let created = match compute.create_instance(&input).await {
            Ok(instance) => instance,
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to create machine",
                    format!("API error: {}", e),
                ));
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics,
                };
            }
        };

        let id = created.id.clone();
        let conf: StateChangeConf<'_, Instance, ApiError> = StateChangeConf {
            pending: vec!["provisioning".to_string()],
            target: vec!["running".to_string()],
            refresh: Box::new(|| {
                let compute = provider_data.client.compute();
                let id = id.clone();
                async move {
                    let instance = compute.get_instance(&id).await?;
                    let state = instance.state.clone();
                    Ok((instance, state))
                }
                .boxed()
            }),
            timeout: SLOW_RESOURCE_TIMEOUT,
            min_interval: DEFAULT_POLL_INTERVAL,
        };
        if let Err(e) = conf.wait().await {
            diagnostics.push(Diagnostic::error(
                "Machine did not start",
                format!("Error waiting for machine '{}' to run: {}", created.id, e),
            ));
            return CreateResourceResponse {
                new_state: request.planned_state,
                diagnostics,
            };
        }

        // CNS records are published asynchronously after the machine runs.
        let cns = match cns_from_config(&request.config) {
            Ok(cns) => cns,
            Err(diag) => {
                diagnostics.push(diag);
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics,
                };
            }
        };
        // Only configured services have records to wait on; accounts with
        // CNS disabled never fill in dns_names at all.
        let services = cns.map(|c| c.services).unwrap_or_default();
        if !services.is_empty() {
            let wait = wait_for(
                "CNS domain names to publish",
                SLOW_RESOURCE_TIMEOUT,
                DEFAULT_POLL_INTERVAL,
                || compute.get_instance(&created.id),
                |instance: &Instance| services_published(&services, &instance.dns_names),
            )
            .await;
            if let Err(e) = wait {
                diagnostics.push(Diagnostic::error(
                    "CNS records were not published",
                    format!(
                        "Error waiting for domain names on machine '{}': {}",
                        created.id, e
                    ),
                ));
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics,
                };
            }
        }

        match Self::read_state(provider_data, &created.id).await {
            Ok(mut state) => {
                Self::carry_over(&mut state, &request.config);
                CreateResourceResponse {
                    new_state: state,
                    diagnostics,
                }
            }
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to read machine after create",
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

        let id = match request.current_state.get_string(&AttributePath::new("id")) {
            Ok(id) => id,
            Err(_) => {
                return ReadResourceResponse {
                    new_state: None,
                    diagnostics,
                };
            }
        };

        match Self::read_state(provider_data, &id).await {
            Ok(mut state) => {
                Self::carry_over(&mut state, &request.current_state);
                ReadResourceResponse {
                    new_state: Some(state),
                    diagnostics,
                }
            }
            Err(e) if e.is_not_found() => ReadResourceResponse {
                new_state: None,
                diagnostics,
            },
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to read machine",
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
        let mut diagnostics = vec![];

        let provider_data = match &self.provider_data {
            Some(data) => data,
            None => {
                diagnostics.push(Diagnostic::error(
                    "Provider not configured",
                    "Provider data was not properly configured",
                ));
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    diagnostics,
                };
            }
        };

        let id = match request.prior_state.get_string(&AttributePath::new("id")) {
            Ok(id) => id,
            Err(e) => {
                diagnostics.push(Diagnostic::error("Missing id", e.to_string()));
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    diagnostics,
                };
            }
        };

        let prior = &request.prior_state;
        let planned = &request.planned_state;
        let step = async {
            let old_name = prior
                .get_string_opt(&AttributePath::new("name"))
                .ok()
                .flatten()
                .unwrap_or_default();
            let new_name = planned
                .get_string_opt(&AttributePath::new("name"))
                .ok()
                .flatten()
                .unwrap_or_default();
            if new_name != old_name && !new_name.is_empty() {
                Self::update_name(provider_data, &id, &new_name).await?;
            }

            let old_tags = string_map(prior, "tags")?;
            let new_tags = string_map(planned, "tags")?;
            let old_cns = cns_from_config(prior)?;
            let new_cns = cns_from_config(planned)?;
            if old_tags != new_tags || old_cns != new_cns {
                Self::update_tags(provider_data, &id, prior, planned).await?;
            }

            let old_package = prior
                .get_string_opt(&AttributePath::new("package"))
                .ok()
                .flatten()
                .unwrap_or_default();
            let new_package = planned
                .get_string_opt(&AttributePath::new("package"))
                .ok()
                .flatten()
                .unwrap_or_default();
            if new_package != old_package && !new_package.is_empty() {
                Self::update_package(provider_data, &id, &new_package).await?;
            }

            let old_firewall = prior
                .get_bool_opt(&AttributePath::new("firewall_enabled"))
                .ok()
                .flatten()
                .unwrap_or(false);
            let new_firewall = planned
                .get_bool_opt(&AttributePath::new("firewall_enabled"))
                .ok()
                .flatten()
                .unwrap_or(false);
            if new_firewall != old_firewall {
                Self::update_firewall(provider_data, &id, new_firewall).await?;
            }

            let old_networks = string_list(prior, "networks")?;
            let new_networks = string_list(planned, "networks")?;
            if old_networks != new_networks {
                Self::update_networks(provider_data, &id, &old_networks, &new_networks).await?;
            }

            let old_metadata = full_metadata_from_config(prior)?;
            let new_metadata = full_metadata_from_config(planned)?;
            if old_metadata != new_metadata {
                Self::update_metadata(provider_data, &id, prior, planned).await?;
            }

            Ok::<(), Diagnostic>(())
        }
        .await;
        if let Err(diag) = step {
            diagnostics.push(diag);
            return UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics,
            };
        }

        match Self::read_state(provider_data, &id).await {
            Ok(mut state) => {
                Self::carry_over(&mut state, planned);
                UpdateResourceResponse {
                    new_state: state,
                    diagnostics,
                }
            }
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to read machine after update",
                    format!("API error: {}", e),
                ));
                UpdateResourceResponse {
                    new_state: request.prior_state,
                    diagnostics,
                }
            }
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

        let id = match request.prior_state.get_string(&AttributePath::new("id")) {
            Ok(id) => id,
            Err(_) => {
                return DeleteResourceResponse { diagnostics };
            }
        };

        let compute = provider_data.client.compute();
        match compute.delete_instance(&id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => return DeleteResourceResponse { diagnostics },
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to delete machine",
                    format!("API error: {}", e),
                ));
                return DeleteResourceResponse { diagnostics };
            }
        }

        let conf = StateChangeConf {
            pending: vec![],
            target: vec!["deleted".to_string()],
            refresh: Box::new(|| {
                let compute = provider_data.client.compute();
                let id = id.clone();
                async move {
                    match compute.get_instance(&id).await {
                        Ok(instance) => {
                            let state = instance.state.clone();
                            Ok((Some(instance), state))
                        }
                        Err(e) if e.is_not_found() => Ok((None, "deleted".to_string())),
                        Err(e) => Err(e),
                    }
                }
                .boxed()
            }),
            timeout: SLOW_RESOURCE_TIMEOUT,
            min_interval: DEFAULT_POLL_INTERVAL,
        };
        if let Err(e) = conf.wait().await {
            diagnostics.push(Diagnostic::error(
                "Machine was not deleted",
                format!("Error waiting for machine '{}' to be deleted: {}", id, e),
            ));
        }

        DeleteResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithConfigure for MachineResource {
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
impl ResourceWithImportState for MachineResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse {
            imported_resources: vec![],
            diagnostics: vec![],
        };
        import_state_passthrough_id(&ctx, AttributePath::new("id"), &request, &mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Client;

    fn test_resource(server_url: &str) -> MachineResource {
        let client = Client::new(server_url, "demo", "aa:bb", false).unwrap();
        MachineResource {
            provider_data: Some(TritonProviderData::new(client)),
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn schema_requires_package_and_image() {
        let schema = MachineResource::resource_schema();
        assert_eq!(schema.validate_config(&DynamicValue::empty_object()).len(), 2);

        let mut config = DynamicValue::empty_object();
        config
            .set_string(&AttributePath::new("package"), "g4-highcpu-1G".to_string())
            .unwrap();
        config
            .set_string(&AttributePath::new("image"), "img-1".to_string())
            .unwrap();
        assert!(schema.validate_config(&config).is_empty());
    }

    #[test]
    fn diff_networks_splits_both_directions() {
        let old = strings(&["net-a", "net-b"]);
        let new = strings(&["net-b", "net-c"]);

        let (to_remove, to_add) = diff_networks(&old, &new);
        assert_eq!(to_remove, strings(&["net-a"]));
        assert_eq!(to_add, strings(&["net-c"]));
    }

    #[test]
    fn diff_networks_identical_sets_are_noop() {
        let nets = strings(&["net-a", "net-b"]);
        let (to_remove, to_add) = diff_networks(&nets, &nets);
        assert!(to_remove.is_empty());
        assert!(to_add.is_empty());
    }

    #[test]
    fn service_publication_needs_every_service() {
        let services = strings(&["web", "api"]);
        let partial = strings(&["web.svc.acct.triton.zone"]);
        let full = strings(&["web.svc.acct.triton.zone", "api.svc.acct.triton.zone"]);

        assert!(!services_published(&services, &partial));
        assert!(services_published(&services, &full));
        assert!(services_published(&[], &[]));
    }

    #[test]
    fn valid_domains_disable_requires_empty() {
        assert!(has_valid_domain_names(true, true, &[], &[], &[]));
        assert!(!has_valid_domain_names(
            true,
            true,
            &[],
            &[],
            &strings(&["web.svc.acct.triton.zone"])
        ));
    }

    #[test]
    fn valid_domains_dropped_service_must_be_withdrawn() {
        let old = strings(&["web", "api"]);
        let new = strings(&["web"]);
        let still_published = strings(&[
            "web.svc.acct.triton.zone",
            "api.svc.acct.triton.zone",
        ]);
        let withdrawn = strings(&["web.svc.acct.triton.zone"]);

        assert!(!has_valid_domain_names(true, false, &old, &new, &still_published));
        assert!(has_valid_domain_names(true, false, &old, &new, &withdrawn));
    }

    #[test]
    fn metadata_aliases_fold_into_metadata_map() {
        let mut config = DynamicValue::empty_object();
        config
            .set_string(&AttributePath::new("user_script"), "#!/bin/sh".to_string())
            .unwrap();
        config
            .set_string(&AttributePath::new("cloud_config"), "#cloud-config".to_string())
            .unwrap();
        config
            .set_map(
                &AttributePath::new("metadata"),
                [("env".to_string(), Dynamic::String("prod".to_string()))].into(),
            )
            .unwrap();

        let metadata = full_metadata_from_config(&config).unwrap();
        assert_eq!(metadata.get("user-script").map(String::as_str), Some("#!/bin/sh"));
        assert_eq!(
            metadata.get("cloud-init:user-data").map(String::as_str),
            Some("#cloud-config")
        );
        assert_eq!(metadata.get("env").map(String::as_str), Some("prod"));
    }

    #[test]
    fn cns_services_become_reserved_tag_on_create() {
        let mut config = DynamicValue::empty_object();
        config
            .set_string(&AttributePath::new("package"), "g4-highcpu-1G".to_string())
            .unwrap();
        config
            .set_string(&AttributePath::new("image"), "img-1".to_string())
            .unwrap();
        let mut block: HashMap<String, Dynamic> = HashMap::new();
        block.insert(
            "services".to_string(),
            Dynamic::List(vec![
                Dynamic::String("web".to_string()),
                Dynamic::String("api".to_string()),
            ]),
        );
        config
            .set_list(&AttributePath::new("cns"), vec![Dynamic::Map(block)])
            .unwrap();

        let input = MachineResource::extract_create_input(&config).unwrap();
        assert_eq!(
            input.tags.get(CNS_SERVICES_TAG).map(String::as_str),
            Some("web,api")
        );
    }

    #[test]
    fn instance_state_splits_cns_tags_from_user_tags() {
        let instance: Instance = serde_json::from_str(
            r#"{"id": "vm-1", "name": "web-01", "state": "running",
                "tags": {"role": "web", "triton.cns.services": "web,api",
                         "triton.cns.disable": "true"},
                "dns_names": ["web.svc.acct.triton.zone"]}"#,
        )
        .unwrap();

        let state = MachineResource::instance_to_state(&instance, &[]);
        let tags = state.get_map(&AttributePath::new("tags")).unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags.get("role").and_then(|v| v.as_str()), Some("web"));

        let cns = state.get_list(&AttributePath::new("cns")).unwrap();
        assert_eq!(cns.len(), 1);
        let Dynamic::Map(block) = &cns[0] else {
            panic!("cns entry should be a map");
        };
        assert_eq!(block.get("disable"), Some(&Dynamic::Bool(true)));
    }

    #[tokio::test]
    async fn create_provisions_and_reads_back() {
        let mut server = mockito::Server::new_async().await;
        let create = server
            .mock("POST", "/demo/machines")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"name": "web-01", "package": "g4-highcpu-1G", "image": "img-1"}"#.to_string(),
            ))
            .with_status(201)
            .with_body(r#"{"id": "vm-1", "name": "web-01", "state": "provisioning"}"#)
            .create_async()
            .await;
        let poll = server
            .mock("GET", "/demo/machines/vm-1")
            .with_status(200)
            .with_body(
                r##"{"id": "vm-1", "name": "web-01", "state": "running",
                    "image": "img-1", "package": "g4-highcpu-1G",
                    "primaryIp": "10.0.0.5", "ips": ["10.0.0.5"],
                    "dns_names": ["web-01.inst.acct.triton.zone"],
                    "metadata": {"user-script": "#!/bin/sh"}}"##,
            )
            .create_async()
            .await;
        let nics = server
            .mock("GET", "/demo/machines/vm-1/nics")
            .with_status(200)
            .with_body(
                r#"[{"mac": "90:b8:d0:aa:bb:cc", "ip": "10.0.0.5", "primary": true,
                     "network": "net-1", "state": "running"}]"#,
            )
            .create_async()
            .await;

        let resource = test_resource(&server.url());

        let mut config = DynamicValue::empty_object();
        config
            .set_string(&AttributePath::new("name"), "web-01".to_string())
            .unwrap();
        config
            .set_string(&AttributePath::new("package"), "g4-highcpu-1G".to_string())
            .unwrap();
        config
            .set_string(&AttributePath::new("image"), "img-1".to_string())
            .unwrap();

        let response = resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: "triton_machine".to_string(),
                    planned_state: config.clone(),
                    config,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
        let state = response.new_state;
        assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), "vm-1");
        assert_eq!(
            state.get_string(&AttributePath::new("primaryip")).unwrap(),
            "10.0.0.5"
        );
        assert_eq!(
            state.get_string(&AttributePath::new("user_script")).unwrap(),
            "#!/bin/sh"
        );
        let networks = state.get_list(&AttributePath::new("networks")).unwrap();
        assert_eq!(networks, vec![Dynamic::String("net-1".to_string())]);
        create.assert_async().await;
        poll.assert_async().await;
        nics.assert_async().await;
    }

    #[tokio::test]
    async fn create_without_cns_services_skips_domain_wait() {
        let mut server = mockito::Server::new_async().await;
        let create = server
            .mock("POST", "/demo/machines")
            .with_status(201)
            .with_body(r#"{"id": "vm-2", "name": "db-01", "state": "provisioning"}"#)
            .create_async()
            .await;
        let poll = server
            .mock("GET", "/demo/machines/vm-2")
            .with_status(200)
            .with_body(
                r#"{"id": "vm-2", "name": "db-01", "state": "running",
                    "image": "img-1", "package": "g4-highcpu-1G"}"#,
            )
            .create_async()
            .await;
        let nics = server
            .mock("GET", "/demo/machines/vm-2/nics")
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let resource = test_resource(&server.url());

        let mut config = DynamicValue::empty_object();
        config
            .set_string(&AttributePath::new("name"), "db-01".to_string())
            .unwrap();
        config
            .set_string(&AttributePath::new("package"), "g4-highcpu-1G".to_string())
            .unwrap();
        config
            .set_string(&AttributePath::new("image"), "img-1".to_string())
            .unwrap();

        let response = resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: "triton_machine".to_string(),
                    planned_state: config.clone(),
                    config,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
        assert_eq!(
            response.new_state.get_string(&AttributePath::new("id")).unwrap(),
            "vm-2"
        );
        create.assert_async().await;
        poll.assert_async().await;
        nics.assert_async().await;
    }

    #[tokio::test]
    async fn network_update_detaches_and_attaches_by_diff() {
        let mut server = mockito::Server::new_async().await;
        let list_nics = server
            .mock("GET", "/demo/machines/vm-1/nics")
            .with_status(200)
            .with_body(
                r#"[{"mac": "90:b8:d0:00:00:0a", "ip": "10.0.0.5", "network": "net-a"},
                    {"mac": "90:b8:d0:00:00:0b", "ip": "10.0.1.5", "network": "net-b"}]"#,
            )
            .create_async()
            .await;
        let remove_a = server
            .mock("DELETE", "/demo/machines/vm-1/nics/90:b8:d0:00:00:0a")
            .with_status(204)
            .expect(1)
            .create_async()
            .await;
        let remove_b = server
            .mock("DELETE", "/demo/machines/vm-1/nics/90:b8:d0:00:00:0b")
            .expect(0)
            .create_async()
            .await;
        let add_c = server
            .mock("POST", "/demo/machines/vm-1/nics")
            .match_body(mockito::Matcher::Json(serde_json::json!({
                "network": "net-c"
            })))
            .with_status(201)
            .with_body(r#"{"mac": "90:b8:d0:00:00:0c", "network": "net-c"}"#)
            .expect(1)
            .create_async()
            .await;

        let client = Client::new(&server.url(), "demo", "aa:bb", false).unwrap();
        let provider_data = TritonProviderData::new(client);

        MachineResource::update_networks(
            &provider_data,
            "vm-1",
            &strings(&["net-a", "net-b"]),
            &strings(&["net-b", "net-c"]),
        )
        .await
        .unwrap();

        list_nics.assert_async().await;
        remove_a.assert_async().await;
        remove_b.assert_async().await;
        add_c.assert_async().await;
    }
}
