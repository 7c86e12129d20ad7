//! v1 quota and usage records.
//!
//! Object storage is a single undifferentiated byte count per region.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-region limits as reported by `GET /v1/projects/{id}/quota`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaV1 {
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
    #[serde(rename = "network.loadbalancers")]
    pub network_loadbalancers: f64,
    #[serde(rename = "s3.space_bytes")]
    pub s3_space_bytes: f64,
    #[serde(rename = "volume.space_gb")]
    pub volume_space_gb: f64,
    #[serde(rename = "volume.volumes")]
    pub volume_volumes: f64,
}

/// Per-region consumption as reported by `GET /v1/projects/{id}/current_usage`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrentUsageV1 {
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
    #[serde(rename = "network.loadbalancers")]
    pub network_loadbalancers: f64,
    #[serde(rename = "s3.space_bytes")]
    pub s3_space_bytes: f64,
    #[serde(rename = "volume.space_gb")]
    pub volume_space_gb: f64,
    #[serde(rename = "volume.volumes")]
    pub volume_volumes: f64,
}
