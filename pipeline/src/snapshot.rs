use serde::{
    Deserialize,
    Serialize,
};
use std::collections::BTreeMap;

pub type Gauges = BTreeMap<String, f64>;
pub type Counters = BTreeMap<String, i64>;

/// The values of one source at one sampling instant.
///
/// A snapshot that travels through the scheduler channel is always a copy of
/// the poller's live maps, so its receiver owns it exclusively.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub gauges: Gauges,
    #[serde(default)]
    pub counters: Counters,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.gauges.len() + self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gauges.is_empty() && self.counters.is_empty()
    }

    /// Gauges first, then counters.
    ///
    /// JSON cannot carry NaN or infinities, so such gauges are left out.
    pub fn into_metrics(self) -> Vec<Metric> {
        let mut metrics = Vec::with_capacity(self.len());
        for (id, value) in self.gauges {
            if !value.is_finite() {
                debug!(id = %id, value, "skipping non-finite gauge");
                continue;
            }
            metrics.push(Metric::gauge(id, value));
        }
        metrics.extend(self.counters.into_iter().map(|(id, delta)| Metric::counter(id, delta)));
        metrics
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Gauge,
    Counter,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Counter => "counter",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the `/updates/` body. A gauge only ever carries `value`, a
/// counter only ever carries `delta`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metric {
    id: String,
    #[serde(rename = "type")]
    kind: MetricKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    delta: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<f64>,
}

impl Metric {
    pub fn gauge(id: impl Into<String>, value: f64) -> Self {
        Self {
            id: id.into(),
            kind: MetricKind::Gauge,
            delta: None,
            value: Some(value),
        }
    }

    pub fn counter(id: impl Into<String>, delta: i64) -> Self {
        Self {
            id: id.into(),
            kind: MetricKind::Counter,
            delta: Some(delta),
            value: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn delta(&self) -> Option<i64> {
        self.delta
    }
}
