//! SeriesRegistry - per-family value stores with lazy, one-time gauge registration
//!
//! Every family owns two concurrent maps keyed by [`IdentityKey`]:
//! - `values`: the last reported value (0 or 1), read live at scrape time
//! - `registered`: the keys already bound to a gauge in the [`GaugeRegistry`]
//!
//! `report` always updates `values` first. Registration happens once per key,
//! serialized through the `registered` entry lock so that concurrent reports
//! for a never-seen key produce exactly one gauge. The entry lock only covers
//! in-memory work and is never held across an await.

use crate::gauge_registry::{GaugeRegistry, GaugeSource, RegistryError};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use ocp_metrics_types::{FamilyStatus, IdentityKey, MetricFamily, SeriesSnapshot};
use std::sync::Arc;

/// Backing state for one metric family
#[derive(Default)]
pub struct FamilyStore {
    values: DashMap<IdentityKey, u8>,
    registered: DashMap<IdentityKey, ()>,
}

impl FamilyStore {
    pub fn value(&self, key: &IdentityKey) -> Option<u8> {
        self.values.get(key).map(|v| *v)
    }
}

/// Live view of one series: re-reads the family store on every call
pub struct SeriesAccessor {
    store: Arc<FamilyStore>,
    key: IdentityKey,
}

impl GaugeSource for SeriesAccessor {
    fn value(&self) -> f64 {
        self.store.value(&self.key).map(f64::from).unwrap_or(0.0)
    }
}

/// What a `report` call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// First sighting: a new gauge was registered
    Registered,
    /// The series already existed; only the value was updated
    Updated,
}

pub struct SeriesRegistry {
    gauges: Arc<dyn GaugeRegistry>,
    builds: Arc<FamilyStore>,
    deployments: Arc<FamilyStore>,
}

impl SeriesRegistry {
    pub fn new(gauges: Arc<dyn GaugeRegistry>) -> Self {
        Self {
            gauges,
            builds: Arc::default(),
            deployments: Arc::default(),
        }
    }

    fn store(&self, family: MetricFamily) -> &Arc<FamilyStore> {
        match family {
            MetricFamily::LastBuildFailed => &self.builds,
            MetricFamily::LastDeploymentFailed => &self.deployments,
        }
    }

    /// Record the latest value for `key` and make sure exactly one gauge exposes it.
    ///
    /// If registration fails the value stays stored and the key stays
    /// unregistered, so the next report for it retries the registration.
    pub fn report(
        &self,
        family: MetricFamily,
        key: IdentityKey,
        failed: bool,
    ) -> Result<ReportOutcome, RegistryError> {
        let store = self.store(family);
        store.values.insert(key.clone(), u8::from(failed));

        if store.registered.contains_key(&key) {
            return Ok(ReportOutcome::Updated);
        }

        match store.registered.entry(key) {
            Entry::Occupied(_) => Ok(ReportOutcome::Updated),
            Entry::Vacant(slot) => {
                let name = family.metric_name();
                let labels = family.labels(slot.key());

                if self.gauges.find_gauge(name, &labels) {
                    slot.insert(());
                    return Ok(ReportOutcome::Updated);
                }

                let accessor = Arc::new(SeriesAccessor {
                    store: Arc::clone(store),
                    key: slot.key().clone(),
                });
                let help = family.help();
                self.gauges.register_gauge(name, help, &labels, accessor)?;

                log::info!("[OCP_METRICS] Registered {} for {}", family, slot.key());
                slot.insert(());
                Ok(ReportOutcome::Registered)
            }
        }
    }

    /// Last reported value for a series
    pub fn value(&self, family: MetricFamily, key: &IdentityKey) -> Option<u8> {
        self.store(family).value(key)
    }

    /// Number of series registered for a family
    pub fn series_count(&self, family: MetricFamily) -> usize {
        self.store(family).registered.len()
    }

    /// All stored values, sorted by family then key
    pub fn snapshot(&self) -> Vec<SeriesSnapshot> {
        let mut series = Vec::new();
        for family in MetricFamily::ALL {
            for entry in self.store(family).values.iter() {
                series.push(SeriesSnapshot {
                    family,
                    namespace: entry.key().namespace.clone(),
                    name: entry.key().name.clone(),
                    value: *entry.value(),
                });
            }
        }

        series.sort_by(|a, b| {
            let left = (a.family.short_name(), &a.namespace, &a.name);
            let right = (b.family.short_name(), &b.namespace, &b.name);
            left.cmp(&right)
        });
        series
    }

    /// Per-family counts for the status endpoint
    pub fn family_status(&self) -> Vec<FamilyStatus> {
        MetricFamily::ALL
            .into_iter()
            .map(|family| {
                let store = self.store(family);
                let failing = store.values.iter().filter(|e| *e.value() == 1).count();
                FamilyStatus {
                    family,
                    metric_name: family.metric_name().to_string(),
                    series: store.registered.len(),
                    failing,
                }
            })
            .collect()
    }
}
