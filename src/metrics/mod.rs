//! Metric registry — the exported quota gauges plus exporter self-metrics.
//!
//! Quota gauges are held as immutable generations:
//!
//!   publish(points)
//!        ↓ build a fresh Generation off to the side
//!   ArcSwap::store (single atomic pointer swap)
//!        ↓
//!   scrapes load() whichever generation is current
//!
//! A scrape never sees an empty or half-filled generation, and series
//! missing from the newest generation are gone, not stale.

use arc_swap::ArcSwap;
use chrono::Utc;
use prometheus::core::{Collector, Desc};
use prometheus::{proto, Gauge, IntCounterVec, IntGauge, Opts, Registry};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::normalize::{Metric, MetricPoint};

pub const POLL_STAGES: [&str; 3] = ["auth", "quota", "usage"];

// ── Generation ──────────────────────────────────────────────────────

/// One complete, immutable set of quota series.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    /// Indexed by [`Metric::index`]; label values → value.
    series: Vec<BTreeMap<Vec<String>, f64>>,
}

impl Generation {
    pub fn empty() -> Self {
        Self {
            series: vec![BTreeMap::new(); Metric::ALL.len()],
        }
    }

    /// Build a generation; a repeated label combination keeps the last value.
    pub fn from_points(points: &[MetricPoint]) -> Self {
        let mut generation = Self::empty();
        for point in points {
            let labels = point.label_values().into_iter().map(str::to_string).collect();
            generation.series[point.metric.index()].insert(labels, point.value);
        }
        generation
    }

    #[cfg(test)]
    pub fn get(&self, metric: Metric, labels: &[&str]) -> Option<f64> {
        let key: Vec<String> = labels.iter().map(|s| s.to_string()).collect();
        self.series[metric.index()].get(&key).copied()
    }

    /// Total number of series across all metrics.
    pub fn len(&self) -> usize {
        self.series.iter().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn family(&self, metric: Metric) -> Option<proto::MetricFamily> {
        let series = &self.series[metric.index()];
        if series.is_empty() {
            return None;
        }

        let names = metric.label_kind().label_names();
        let mut family = proto::MetricFamily::default();
        family.set_name(metric.name().to_string());
        family.set_help(metric.help().to_string());
        family.set_field_type(proto::MetricType::GAUGE);

        for (values, value) in series {
            let mut pairs: Vec<proto::LabelPair> = names
                .iter()
                .zip(values)
                .map(|(name, label_value)| {
                    let mut pair = proto::LabelPair::default();
                    pair.set_name(name.to_string());
                    pair.set_value(label_value.clone());
                    pair
                })
                .collect();
            pairs.sort_by(|a, b| a.get_name().cmp(b.get_name()));

            let mut gauge = proto::Gauge::default();
            gauge.set_value(*value);

            let mut m = proto::Metric::default();
            for pair in pairs {
                m.mut_label().push(pair);
            }
            m.set_gauge(gauge);
            family.mut_metric().push(m);
        }

        Some(family)
    }
}

/// Exposes the current generation to a `prometheus::Registry`.
struct GenerationCollector {
    descs: Vec<Desc>,
    current: Arc<ArcSwap<Generation>>,
}

impl GenerationCollector {
    fn new(current: Arc<ArcSwap<Generation>>) -> prometheus::Result<Self> {
        let descs = Metric::ALL
            .iter()
            .map(|m| {
                Desc::new(
                    m.name().to_string(),
                    m.help().to_string(),
                    m.label_kind()
                        .label_names()
                        .iter()
                        .map(|s| s.to_string())
                        .collect(),
                    HashMap::new(),
                )
            })
            .collect::<prometheus::Result<Vec<_>>>()?;
        Ok(Self { descs, current })
    }
}

impl Collector for GenerationCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.descs.iter().collect()
    }

    fn collect(&self) -> Vec<proto::MetricFamily> {
        let generation = self.current.load();
        Metric::ALL
            .iter()
            .filter_map(|m| generation.family(*m))
            .collect()
    }
}

// ── Public API ──────────────────────────────────────────────────────

/// Shared between the poll driver (sole writer) and the scrape server.
pub struct QuotaMetrics {
    current: Arc<ArcSwap<Generation>>,
    poll_failures: IntCounterVec,
    last_success: Gauge,
    published_points: IntGauge,
}

impl QuotaMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let poll_failures = IntCounterVec::new(
            Opts::new(
                "syseleven_exporter_poll_failures_total",
                "Failed poll cycles by stage",
            ),
            &["stage"],
        )?;
        for stage in POLL_STAGES {
            poll_failures.with_label_values(&[stage]);
        }

        Ok(Self {
            current: Arc::new(ArcSwap::from_pointee(Generation::empty())),
            poll_failures,
            last_success: Gauge::new(
                "syseleven_exporter_last_success_timestamp_seconds",
                "Unix time of the last successful publish",
            )?,
            published_points: IntGauge::new(
                "syseleven_exporter_published_points",
                "Number of quota series in the current generation",
            )?,
        })
    }

    /// Register every collector with `registry`.
    pub fn register(&self, registry: &Registry) -> prometheus::Result<()> {
        registry.register(Box::new(GenerationCollector::new(Arc::clone(&self.current))?))?;
        registry.register(Box::new(self.poll_failures.clone()))?;
        registry.register(Box::new(self.last_success.clone()))?;
        registry.register(Box::new(self.published_points.clone()))?;
        Ok(())
    }

    /// Replace the whole quota series set with `points`.
    ///
    /// Returns the number of distinct series now exposed.
    pub fn publish(&self, points: &[MetricPoint]) -> usize {
        let generation = Generation::from_points(points);
        let series = generation.len();
        if generation.is_empty() {
            warn!("Upstream reported no regions — publishing an empty generation");
        }
        self.current.store(Arc::new(generation));

        self.published_points.set(series as i64);
        self.last_success.set(Utc::now().timestamp() as f64);
        debug!(series, "Generation swapped in");
        series
    }

    pub fn record_failure(&self, stage: &str) {
        self.poll_failures.with_label_values(&[stage]).inc();
    }

    #[cfg(test)]
    pub fn failures(&self, stage: &str) -> u64 {
        self.poll_failures.with_label_values(&[stage]).get()
    }

    /// The generation scrapes currently see.
    #[cfg(test)]
    pub fn snapshot(&self) -> Arc<Generation> {
        self.current.load_full()
    }

    #[cfg(test)]
    pub fn value(&self, metric: Metric, labels: &[&str]) -> Option<f64> {
        self.current.load().get(metric, labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::{Encoder, TextEncoder};

    fn point(metric: Metric, region: &str, qualifier: Option<&str>, value: f64) -> MetricPoint {
        MetricPoint {
            metric,
            region: region.into(),
            project: "proj-1".into(),
            qualifier: qualifier.map(String::from),
            value,
        }
    }

    fn render(registry: &Registry) -> String {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&registry.gather(), &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_starts_empty() {
        let metrics = QuotaMetrics::new().unwrap();
        assert!(metrics.snapshot().is_empty());
        assert_eq!(metrics.failures("auth"), 0);
    }

    #[test]
    fn test_publish_sets_values() {
        let metrics = QuotaMetrics::new().unwrap();
        metrics.publish(&[
            point(Metric::ComputeCoresTotal, "region-a", None, 10.0),
            point(Metric::ComputeFlavorsUsed, "region-a", Some("m1.small"), 1.0),
        ]);

        assert_eq!(metrics.value(Metric::ComputeCoresTotal, &["region-a", "proj-1"]), Some(10.0));
        assert_eq!(
            metrics.value(Metric::ComputeFlavorsUsed, &["region-a", "proj-1", "m1.small"]),
            Some(1.0)
        );
        assert_eq!(metrics.snapshot().len(), 2);
    }

    #[test]
    fn test_publish_drops_stale_series() {
        let metrics = QuotaMetrics::new().unwrap();
        metrics.publish(&[
            point(Metric::ComputeCoresTotal, "region-a", None, 10.0),
            point(Metric::ComputeCoresTotal, "region-b", None, 20.0),
            point(Metric::ComputeFlavorsUsed, "region-b", Some("m1.large"), 2.0),
        ]);
        metrics.publish(&[point(Metric::ComputeCoresTotal, "region-a", None, 12.0)]);

        assert_eq!(metrics.value(Metric::ComputeCoresTotal, &["region-a", "proj-1"]), Some(12.0));
        assert_eq!(metrics.value(Metric::ComputeCoresTotal, &["region-b", "proj-1"]), None);
        assert_eq!(
            metrics.value(Metric::ComputeFlavorsUsed, &["region-b", "proj-1", "m1.large"]),
            None
        );
    }

    #[test]
    fn test_publish_is_idempotent() {
        let points = vec![
            point(Metric::S3SpaceTotalBytes, "dbl", Some("quobyte"), 1e9),
            point(Metric::VolumeVolumesUsed, "dbl", None, 3.0),
        ];

        let once = QuotaMetrics::new().unwrap();
        once.publish(&points);

        let twice = QuotaMetrics::new().unwrap();
        twice.publish(&points);
        twice.publish(&points);

        assert_eq!(*once.snapshot(), *twice.snapshot());
    }

    #[test]
    fn test_duplicate_points_keep_last_value() {
        let generation = Generation::from_points(&[
            point(Metric::DnsZonesUsed, "r", None, 1.0),
            point(Metric::DnsZonesUsed, "r", None, 2.0),
        ]);
        assert_eq!(generation.len(), 1);
        assert_eq!(generation.get(Metric::DnsZonesUsed, &["r", "proj-1"]), Some(2.0));
    }

    #[test]
    fn test_publish_counts_distinct_series() {
        let metrics = QuotaMetrics::new().unwrap();
        let series = metrics.publish(&[
            point(Metric::DnsZonesUsed, "r", None, 1.0),
            point(Metric::DnsZonesUsed, "r", None, 2.0),
            point(Metric::DnsZonesTotal, "r", None, 5.0),
        ]);
        assert_eq!(series, 2);
        assert_eq!(metrics.published_points.get(), 2);
    }

    #[test]
    fn test_old_snapshot_survives_swap() {
        let metrics = QuotaMetrics::new().unwrap();
        metrics.publish(&[point(Metric::ComputeCoresUsed, "r", None, 1.0)]);

        // A reader holding the old generation keeps a consistent view
        let held = metrics.snapshot();
        metrics.publish(&[point(Metric::ComputeCoresUsed, "r", None, 2.0)]);

        assert_eq!(held.get(Metric::ComputeCoresUsed, &["r", "proj-1"]), Some(1.0));
        assert_eq!(metrics.value(Metric::ComputeCoresUsed, &["r", "proj-1"]), Some(2.0));
    }

    #[test]
    fn test_record_failure() {
        let metrics = QuotaMetrics::new().unwrap();
        metrics.record_failure("usage");
        metrics.record_failure("usage");
        assert_eq!(metrics.failures("usage"), 2);
        assert_eq!(metrics.failures("quota"), 0);
    }

    #[test]
    fn test_text_exposition() {
        let registry = Registry::new();
        let metrics = QuotaMetrics::new().unwrap();
        metrics.register(&registry).unwrap();

        metrics.publish(&[
            point(Metric::ComputeCoresTotal, "region-a", None, 10.0),
            point(Metric::S3SpaceUsedBytes, "region-a", Some("quobyte"), 512.0),
        ]);
        let text = render(&registry);

        assert!(text.contains("# TYPE syseleven_compute_cores_total gauge"));
        assert!(text.contains(r#"syseleven_compute_cores_total{project="proj-1",region="region-a"} 10"#));
        assert!(text.contains(
            r#"syseleven_s3_space_used_bytes{project="proj-1",region="region-a",type="quobyte"} 512"#
        ));
        assert!(text.contains(r#"syseleven_exporter_poll_failures_total{stage="auth"} 0"#));
        assert!(text.contains("syseleven_exporter_published_points 2"));
        // Metrics without series are not rendered
        assert!(!text.contains("syseleven_compute_flavors_used"));
    }

    #[test]
    fn test_register_twice_fails() {
        let registry = Registry::new();
        let metrics = QuotaMetrics::new().unwrap();
        metrics.register(&registry).unwrap();
        assert!(metrics.register(&registry).is_err());
    }
}
