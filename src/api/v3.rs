//! v3 quota and usage records.
//!
//! Differences from v1: load balancers move to `loadbalancer.*`, and
//! object storage is broken down per storage type.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One object-storage backend entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectStorageSpace {
    #[serde(rename = "type")]
    pub storage_type: String,
    pub space_bytes: f64,
}

/// Per-region limits as reported by `GET /v3/projects/{id}/quota`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaV3 {
    #[serde(rename = "compute.cores")]
    pub compute_cores: f64,
    #[serde(rename = "compute.instances")]
    pub compute_instances: f64,
    #[serde(rename = "compute.ram_mb")]
    pub compute_ram_mb: f64,
    #[serde(rename = "dns.zones")]
    pub dns_zones: f64,
    #[serde(rename = "network.floating_ips")]
    pub network_floating_ips: f64,
    #[serde(rename = "loadbalancer.loadbalancers")]
    pub loadbalancer_loadbalancers: f64,
    #[serde(rename = "objectstorage.space_bytes")]
    pub object_storage: Vec<ObjectStorageSpace>,
    #[serde(rename = "volume.space_gb")]
    pub volume_space_gb: f64,
    #[serde(rename = "volume.volumes")]
    pub volume_volumes: f64,
}

/// Per-region consumption as reported by `GET /v3/projects/{id}/current_usage`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrentUsageV3 {
    #[serde(rename = "compute.cores")]
    pub compute_cores: f64,
    #[serde(rename = "compute.flavors")]
    pub compute_flavors: HashMap<String, f64>,
    #[serde(rename = "compute.instances")]
    pub compute_instances: f64,
    #[serde(rename = "compute.ram_mb")]
    pub compute_ram_mb: f64,
    #[serde(rename = "dns.zones")]
    pub dns_zones: f64,
    #[serde(rename = "network.floating_ips")]
    pub network_floating_ips: f64,
    #[serde(rename = "loadbalancer.loadbalancers")]
    pub loadbalancer_loadbalancers: f64,
    #[serde(rename = "objectstorage.space_bytes")]
    pub object_storage: Vec<ObjectStorageSpace>,
    #[serde(rename = "volume.space_gb")]
    pub volume_space_gb: f64,
    #[serde(rename = "volume.volumes")]
    pub volume_volumes: f64,
}
