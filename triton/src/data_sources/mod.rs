//! Data source implementations
//!
//! Lookups against CloudAPI objects the configuration does not manage.
//! The single-result sources (image, package, fabric VLAN, volume) insist
//! on exactly one match so a lookup never silently picks an arbitrary
//! object.

pub mod account;
pub mod datacenter;
pub mod fabric_network;
pub mod fabric_vlan;
pub mod image;
pub mod network;
pub mod package;
pub mod volume;
