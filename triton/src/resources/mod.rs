//! Resource implementations
//!
//! Each resource wraps a CloudAPI object family: machines, fabric
//! networking, firewall rules, SSH keys, snapshots, NFS volumes and the
//! Triton Service Group objects. Mutating operations that settle
//! asynchronously on the server poll for convergence before returning.

use std::time::Duration;

pub mod fabric;
pub mod firewall_rule;
pub mod instance_template;
pub mod key;
pub mod machine;
pub mod service_group;
pub mod snapshot;
pub mod vlan;
pub mod volume;

/// Lifecycle budget for cheap control-plane objects (VLANs, keys, rules)
pub(crate) const FAST_RESOURCE_TIMEOUT: Duration = Duration::from_secs(60);

/// Lifecycle budget for objects that provision hardware-backed state
pub(crate) const SLOW_RESOURCE_TIMEOUT: Duration = Duration::from_secs(600);

/// Names accepted by CloudAPI for machines, groups and templates
pub(crate) const NAME_PATTERN: &str = r"^[a-zA-Z0-9][a-zA-Z0-9_\.\-]*$";
