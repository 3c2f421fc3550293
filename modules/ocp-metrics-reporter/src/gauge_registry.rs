//! Gauge registry seam and its Prometheus-backed implementation.
//!
//! A registered gauge does not hold a value. It holds a [`GaugeSource`] that
//! is asked for the current value every time the registry is gathered, so
//! updates to the backing store show up on the next scrape without any
//! further registration.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use prometheus::core::{Collector, Desc};
use prometheus::{Encoder, Registry, TextEncoder, proto};
use std::collections::HashMap;
use std::sync::Arc;

/// Provides the live value of one exported gauge
pub trait GaugeSource: Send + Sync {
    fn value(&self) -> f64;
}

/// Errors raised by a gauge registry
#[derive(Debug)]
pub enum RegistryError {
    /// The name, help text or labels do not form a valid metric descriptor
    InvalidDescriptor(String),
    /// The registry refused the collector
    Rejected(String),
    /// The exposition could not be encoded
    Encode(String),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::InvalidDescriptor(e) => write!(f, "Invalid gauge descriptor: {}", e),
            RegistryError::Rejected(e) => write!(f, "Gauge registration rejected: {}", e),
            RegistryError::Encode(e) => write!(f, "Failed to encode metrics: {}", e),
        }
    }
}

impl std::error::Error for RegistryError {}

/// The metrics-registry collaborator used by the series registry.
///
/// `register_gauge` must be idempotent for a given name + label set: a second
/// registration of the same series succeeds and keeps the first binding.
pub trait GaugeRegistry: Send + Sync {
    fn register_gauge(
        &self,
        name: &str,
        help: &str,
        labels: &[(String, String)],
        source: Arc<dyn GaugeSource>,
    ) -> Result<(), RegistryError>;

    /// Exact name + label lookup
    fn find_gauge(&self, name: &str, labels: &[(String, String)]) -> bool;
}

type SeriesId = (String, Vec<(String, String)>);

fn series_id(name: &str, labels: &[(String, String)]) -> SeriesId {
    let mut labels = labels.to_vec();
    labels.sort();
    (name.to_string(), labels)
}

/// [`GaugeRegistry`] backed by a `prometheus::Registry` with common labels.
pub struct PrometheusGaugeRegistry {
    registry: Registry,
    series: DashMap<SeriesId, ()>,
}

impl PrometheusGaugeRegistry {
    /// Create a registry that tags every series with `application=<application>`
    pub fn new(application: &str) -> Result<Self, RegistryError> {
        let mut common = HashMap::new();
        common.insert("application".to_string(), application.to_string());
        let registry = Registry::new_custom(None, Some(common))
            .map_err(|e| RegistryError::InvalidDescriptor(e.to_string()))?;

        Ok(Self {
            registry,
            series: DashMap::new(),
        })
    }

    /// Content type of [`render`](Self::render) output
    pub fn content_type(&self) -> &'static str {
        prometheus::TEXT_FORMAT
    }

    /// Gather every series and encode it in the text exposition format
    pub fn render(&self) -> Result<String, RegistryError> {
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&families, &mut buffer)
            .map_err(|e| RegistryError::Encode(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| RegistryError::Encode(e.to_string()))
    }
}

impl GaugeRegistry for PrometheusGaugeRegistry {
    fn register_gauge(
        &self,
        name: &str,
        help: &str,
        labels: &[(String, String)],
        source: Arc<dyn GaugeSource>,
    ) -> Result<(), RegistryError> {
        match self.series.entry(series_id(name, labels)) {
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(slot) => {
                let gauge = LiveGauge::new(name, help, labels, source)?;
                match self.registry.register(Box::new(gauge)) {
                    Ok(()) | Err(prometheus::Error::AlreadyReg) => {
                        slot.insert(());
                        Ok(())
                    }
                    Err(e) => Err(RegistryError::Rejected(e.to_string())),
                }
            }
        }
    }

    fn find_gauge(&self, name: &str, labels: &[(String, String)]) -> bool {
        self.series.contains_key(&series_id(name, labels))
    }
}

/// A single gauge series whose value is read from a source at collect time
struct LiveGauge {
    desc: Desc,
    source: Arc<dyn GaugeSource>,
}

impl LiveGauge {
    fn new(
        name: &str,
        help: &str,
        labels: &[(String, String)],
        source: Arc<dyn GaugeSource>,
    ) -> Result<Self, RegistryError> {
        let label_map: HashMap<String, String> = labels.iter().cloned().collect();
        let desc = Desc::new(name.to_string(), help.to_string(), Vec::new(), label_map)
            .map_err(|e| RegistryError::InvalidDescriptor(e.to_string()))?;
        Ok(Self { desc, source })
    }
}

impl Collector for LiveGauge {
    fn desc(&self) -> Vec<&Desc> {
        vec![&self.desc]
    }

    fn collect(&self) -> Vec<proto::MetricFamily> {
        let mut gauge = proto::Gauge::default();
        gauge.set_value(self.source.value());

        let mut metric = proto::Metric::default();
        metric.set_label(self.desc.const_label_pairs.clone().into());
        metric.set_gauge(gauge);

        let mut family = proto::MetricFamily::default();
        family.set_name(self.desc.fq_name.clone());
        family.set_help(self.desc.help.clone());
        family.set_field_type(proto::MetricType::GAUGE);
        family.set_metric(vec![metric].into());
        vec![family]
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct FixedSource(AtomicU64);

    impl FixedSource {
        fn new(value: f64) -> Arc<Self> {
            Arc::new(Self(AtomicU64::new(value.to_bits())))
        }

        fn set(&self, value: f64) {
            self.0.store(value.to_bits(), Ordering::SeqCst);
        }
    }

    impl GaugeSource for FixedSource {
        fn value(&self) -> f64 {
            f64::from_bits(self.0.load(Ordering::SeqCst))
        }
    }

    const BC: &str = "ocp_bc_last_build_failed";
    const DC: &str = "ocp_dc_last_deployment_failed";

    fn labels(namespace: &str, bc: &str) -> Vec<(String, String)> {
        vec![
            ("namespace".to_string(), namespace.to_string()),
            ("bc".to_string(), bc.to_string()),
        ]
    }

    /// Value of the exposition line for `name` carrying every `key="value"` pair
    pub(crate) fn sample(text: &str, name: &str, pairs: &[(&str, &str)]) -> Option<f64> {
        let prefix = format!("{}{{", name);
        let wanted: Vec<String> = pairs
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", k, v))
            .collect();
        text.lines()
            .filter(|line| line.starts_with(&prefix))
            .find(|line| wanted.iter().all(|pair| line.contains(pair.as_str())))
            .and_then(|line| line.rsplit(' ').next())
            .and_then(|v| v.parse().ok())
    }

    pub(crate) fn sample_count(text: &str, name: &str) -> usize {
        let prefix = format!("{}{{", name);
        text.lines()
            .filter(|line| line.starts_with(&prefix))
            .count()
    }

    #[test]
    fn test_register_and_render_live_value() {
        let registry = PrometheusGaugeRegistry::new("ocp-project-metrics-reporter").unwrap();
        let source = FixedSource::new(1.0);
        registry
            .register_gauge(BC, "help", &labels("ns1", "app"), source.clone())
            .unwrap();

        let pairs = [
            ("namespace", "ns1"),
            ("bc", "app"),
            ("application", "ocp-project-metrics-reporter"),
        ];
        let text = registry.render().unwrap();
        assert_eq!(sample(&text, BC, &pairs), Some(1.0));

        source.set(0.0);
        let text = registry.render().unwrap();
        assert_eq!(sample(&text, BC, &pairs), Some(0.0));
    }

    #[test]
    fn test_duplicate_registration_is_idempotent() {
        let registry = PrometheusGaugeRegistry::new("test").unwrap();
        let app = labels("ns1", "app");
        registry
            .register_gauge(BC, "help", &app, FixedSource::new(1.0))
            .unwrap();
        registry
            .register_gauge(BC, "help", &app, FixedSource::new(0.0))
            .unwrap();

        let text = registry.render().unwrap();
        assert_eq!(sample_count(&text, BC), 1);
        assert_eq!(sample(&text, BC, &[("bc", "app")]), Some(1.0));
    }

    #[test]
    fn test_find_gauge_matches_exact_labels() {
        let registry = PrometheusGaugeRegistry::new("test").unwrap();
        registry
            .register_gauge(BC, "help", &labels("ns1", "app"), FixedSource::new(0.0))
            .unwrap();

        let reordered = vec![
            ("bc".to_string(), "app".to_string()),
            ("namespace".to_string(), "ns1".to_string()),
        ];
        assert!(registry.find_gauge(BC, &reordered));
        assert!(!registry.find_gauge(BC, &labels("ns2", "app")));
        assert!(!registry.find_gauge(DC, &labels("ns1", "app")));
    }

    #[test]
    fn test_invalid_metric_name_is_rejected() {
        let registry = PrometheusGaugeRegistry::new("test").unwrap();
        let app = labels("ns1", "app");
        let source = FixedSource::new(0.0);

        let result = registry.register_gauge("not a metric", "help", &app, source);
        assert!(matches!(result, Err(RegistryError::InvalidDescriptor(_))));
        assert!(!registry.find_gauge("not a metric", &app));
    }
}
