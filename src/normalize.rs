//! Schema normalizer — maps v1 and v3 quota/usage records onto one
//! metric namespace.
//!
//! Both versions produce the same metric names and label shapes. The one
//! real difference is object storage: v3 reports a list of typed entries,
//! v1 a single byte count that is published under [`V1_STORAGE_TYPE`].

use std::collections::HashMap;

use crate::api::{CurrentUsageV1, CurrentUsageV3, ObjectStorageSpace, QuotaV1, QuotaV3};

/// Storage type label carried by v1's undifferentiated S3 value.
pub const V1_STORAGE_TYPE: &str = "quobyte";

// ── Metric Namespace ────────────────────────────────────────────────

/// Every gauge owned by the exporter.
///
/// Discriminants double as indices into per-generation storage, so the
/// order here must match [`Metric::ALL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    ComputeCoresTotal,
    ComputeInstancesTotal,
    ComputeRamTotalMegabytes,
    DnsZonesTotal,
    NetworkFloatingIpsTotal,
    NetworkLoadbalancersTotal,
    S3SpaceTotalBytes,
    VolumeSpaceTotalGigabytes,
    VolumeVolumesTotal,
    ComputeCoresUsed,
    ComputeInstancesUsed,
    ComputeRamUsedMegabytes,
    DnsZonesUsed,
    NetworkFloatingIpsUsed,
    NetworkLoadbalancersUsed,
    S3SpaceUsedBytes,
    VolumeSpaceUsedGigabytes,
    VolumeVolumesUsed,
    ComputeFlavorsUsed,
}

/// Which label set a metric carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKind {
    /// `{region, project}`
    Region,
    /// `{region, project, type}`
    StorageType,
    /// `{region, project, flavor}`
    Flavor,
}

impl LabelKind {
    pub fn label_names(self) -> &'static [&'static str] {
        match self {
            LabelKind::Region => &["region", "project"],
            LabelKind::StorageType => &["region", "project", "type"],
            LabelKind::Flavor => &["region", "project", "flavor"],
        }
    }
}

impl Metric {
    pub const ALL: [Metric; 19] = [
        Metric::ComputeCoresTotal,
        Metric::ComputeInstancesTotal,
        Metric::ComputeRamTotalMegabytes,
        Metric::DnsZonesTotal,
        Metric::NetworkFloatingIpsTotal,
        Metric::NetworkLoadbalancersTotal,
        Metric::S3SpaceTotalBytes,
        Metric::VolumeSpaceTotalGigabytes,
        Metric::VolumeVolumesTotal,
        Metric::ComputeCoresUsed,
        Metric::ComputeInstancesUsed,
        Metric::ComputeRamUsedMegabytes,
        Metric::DnsZonesUsed,
        Metric::NetworkFloatingIpsUsed,
        Metric::NetworkLoadbalancersUsed,
        Metric::S3SpaceUsedBytes,
        Metric::VolumeSpaceUsedGigabytes,
        Metric::VolumeVolumesUsed,
        Metric::ComputeFlavorsUsed,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Exposed metric name. Dashboards depend on these; do not rename.
    pub fn name(self) -> &'static str {
        match self {
            Metric::ComputeCoresTotal => "syseleven_compute_cores_total",
            Metric::ComputeInstancesTotal => "syseleven_compute_instances_total",
            Metric::ComputeRamTotalMegabytes => "syseleven_compute_ram_total_megabytes",
            Metric::DnsZonesTotal => "syseleven_dns_zones_total",
            Metric::NetworkFloatingIpsTotal => "syseleven_network_floating_ips_total",
            Metric::NetworkLoadbalancersTotal => "syseleven_network_loadbalancers_total",
            Metric::S3SpaceTotalBytes => "syseleven_s3_space_total_bytes",
            Metric::VolumeSpaceTotalGigabytes => "syseleven_volume_space_total_gigabytes",
            Metric::VolumeVolumesTotal => "syseleven_volume_volumes_total",
            Metric::ComputeCoresUsed => "syseleven_compute_cores_used",
            Metric::ComputeInstancesUsed => "syseleven_compute_instances_used",
            Metric::ComputeRamUsedMegabytes => "syseleven_compute_ram_used_megabytes",
            Metric::DnsZonesUsed => "syseleven_dns_zones_used",
            Metric::NetworkFloatingIpsUsed => "syseleven_network_floating_ips_used",
            Metric::NetworkLoadbalancersUsed => "syseleven_network_loadbalancers_used",
            Metric::S3SpaceUsedBytes => "syseleven_s3_space_used_bytes",
            Metric::VolumeSpaceUsedGigabytes => "syseleven_volume_space_used_gigabytes",
            Metric::VolumeVolumesUsed => "syseleven_volume_volumes_used",
            Metric::ComputeFlavorsUsed => "syseleven_compute_flavors_used",
        }
    }

    pub fn help(self) -> &'static str {
        match self {
            Metric::ComputeCoresTotal => "Quota for compute cores",
            Metric::ComputeInstancesTotal => "Quota for compute instances",
            Metric::ComputeRamTotalMegabytes => "Quota for compute RAM in megabytes",
            Metric::DnsZonesTotal => "Quota for DNS zones",
            Metric::NetworkFloatingIpsTotal => "Quota for floating IPs",
            Metric::NetworkLoadbalancersTotal => "Quota for load balancers",
            Metric::S3SpaceTotalBytes => "Quota for object storage space in bytes",
            Metric::VolumeSpaceTotalGigabytes => "Quota for volume space in gigabytes",
            Metric::VolumeVolumesTotal => "Quota for number of volumes",
            Metric::ComputeCoresUsed => "Compute cores in use",
            Metric::ComputeInstancesUsed => "Compute instances in use",
            Metric::ComputeRamUsedMegabytes => "Compute RAM in use in megabytes",
            Metric::DnsZonesUsed => "DNS zones in use",
            Metric::NetworkFloatingIpsUsed => "Floating IPs in use",
            Metric::NetworkLoadbalancersUsed => "Load balancers in use",
            Metric::S3SpaceUsedBytes => "Object storage space in use in bytes",
            Metric::VolumeSpaceUsedGigabytes => "Volume space in use in gigabytes",
            Metric::VolumeVolumesUsed => "Volumes in use",
            Metric::ComputeFlavorsUsed => "Compute instances in use per flavor",
        }
    }

    pub fn label_kind(self) -> LabelKind {
        match self {
            Metric::S3SpaceTotalBytes | Metric::S3SpaceUsedBytes => LabelKind::StorageType,
            Metric::ComputeFlavorsUsed => LabelKind::Flavor,
            _ => LabelKind::Region,
        }
    }
}

/// The eight per-region scalar fields shared by quota and usage, in
/// emission order.
const TOTAL_SCALARS: [Metric; 8] = [
    Metric::ComputeCoresTotal,
    Metric::ComputeInstancesTotal,
    Metric::ComputeRamTotalMegabytes,
    Metric::DnsZonesTotal,
    Metric::NetworkFloatingIpsTotal,
    Metric::NetworkLoadbalancersTotal,
    Metric::VolumeSpaceTotalGigabytes,
    Metric::VolumeVolumesTotal,
];

const USED_SCALARS: [Metric; 8] = [
    Metric::ComputeCoresUsed,
    Metric::ComputeInstancesUsed,
    Metric::ComputeRamUsedMegabytes,
    Metric::DnsZonesUsed,
    Metric::NetworkFloatingIpsUsed,
    Metric::NetworkLoadbalancersUsed,
    Metric::VolumeSpaceUsedGigabytes,
    Metric::VolumeVolumesUsed,
];

// ── Metric Points ───────────────────────────────────────────────────

/// One value to publish under one exact label combination.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricPoint {
    pub metric: Metric,
    pub region: String,
    pub project: String,
    /// Storage type or flavor name, depending on the metric's label kind.
    pub qualifier: Option<String>,
    pub value: f64,
}

impl MetricPoint {
    /// Label values in the order of [`LabelKind::label_names`].
    pub fn label_values(&self) -> Vec<&str> {
        let mut values = vec![self.region.as_str(), self.project.as_str()];
        if let Some(q) = &self.qualifier {
            values.push(q.as_str());
        }
        values
    }
}

struct PointBuilder<'a> {
    project: &'a str,
    points: Vec<MetricPoint>,
}

impl<'a> PointBuilder<'a> {
    fn new(project: &'a str) -> Self {
        Self {
            project,
            points: Vec::new(),
        }
    }

    fn push(&mut self, metric: Metric, region: &str, qualifier: Option<&str>, value: f64) {
        self.points.push(MetricPoint {
            metric,
            region: region.to_string(),
            project: self.project.to_string(),
            qualifier: qualifier.map(str::to_string),
            value,
        });
    }

    fn scalars(&mut self, metrics: &[Metric; 8], region: &str, values: [f64; 8]) {
        for (metric, value) in metrics.iter().zip(values) {
            self.push(*metric, region, None, value);
        }
    }

    fn storage(&mut self, metric: Metric, region: &str, entries: &[ObjectStorageSpace]) {
        for entry in entries {
            self.push(metric, region, Some(&entry.storage_type), entry.space_bytes);
        }
    }

    fn flavors(&mut self, region: &str, flavors: &HashMap<String, f64>) {
        for (flavor, count) in sorted(flavors) {
            self.push(Metric::ComputeFlavorsUsed, region, Some(flavor), *count);
        }
    }
}

/// Map entries in key order, so generations are reproducible.
fn sorted<V>(map: &HashMap<String, V>) -> Vec<(&str, &V)> {
    let mut entries: Vec<_> = map.iter().map(|(k, v)| (k.as_str(), v)).collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
}

/// v1's single byte count, expressed as a one-entry typed list.
fn v1_storage(space_bytes: f64) -> [ObjectStorageSpace; 1] {
    [ObjectStorageSpace {
        storage_type: V1_STORAGE_TYPE.to_string(),
        space_bytes,
    }]
}

// ── Normalizers ─────────────────────────────────────────────────────

pub fn normalize_v1(
    quota: &HashMap<String, QuotaV1>,
    usage: &HashMap<String, CurrentUsageV1>,
    project: &str,
) -> Vec<MetricPoint> {
    let mut generation = PointBuilder::new(project);

    for (region, q) in sorted(quota) {
        generation.scalars(
            &TOTAL_SCALARS,
            region,
            [
                q.compute_cores,
                q.compute_instances,
                q.compute_ram_mb,
                q.dns_zones,
                q.network_floating_ips,
                q.network_loadbalancers,
                q.volume_space_gb,
                q.volume_volumes,
            ],
        );
        generation.storage(Metric::S3SpaceTotalBytes, region, &v1_storage(q.s3_space_bytes));
    }

    for (region, u) in sorted(usage) {
        generation.scalars(
            &USED_SCALARS,
            region,
            [
                u.compute_cores,
                u.compute_instances,
                u.compute_ram_mb,
                u.dns_zones,
                u.network_floating_ips,
                u.network_loadbalancers,
                u.volume_space_gb,
                u.volume_volumes,
            ],
        );
        generation.storage(Metric::S3SpaceUsedBytes, region, &v1_storage(u.s3_space_bytes));
        generation.flavors(region, &u.compute_flavors);
    }

    generation.points
}

pub fn normalize_v3(
    quota: &HashMap<String, QuotaV3>,
    usage: &HashMap<String, CurrentUsageV3>,
    project: &str,
) -> Vec<MetricPoint> {
    let mut generation = PointBuilder::new(project);

    for (region, q) in sorted(quota) {
        generation.scalars(
            &TOTAL_SCALARS,
            region,
            [
                q.compute_cores,
                q.compute_instances,
                q.compute_ram_mb,
                q.dns_zones,
                q.network_floating_ips,
                q.loadbalancer_loadbalancers,
                q.volume_space_gb,
                q.volume_volumes,
            ],
        );
        generation.storage(Metric::S3SpaceTotalBytes, region, &q.object_storage);
    }

    for (region, u) in sorted(usage) {
        generation.scalars(
            &USED_SCALARS,
            region,
            [
                u.compute_cores,
                u.compute_instances,
                u.compute_ram_mb,
                u.dns_zones,
                u.network_floating_ips,
                u.loadbalancer_loadbalancers,
                u.volume_space_gb,
                u.volume_volumes,
            ],
        );
        generation.storage(Metric::S3SpaceUsedBytes, region, &u.object_storage);
        generation.flavors(region, &u.compute_flavors);
    }

    generation.points
}
