// Telemetry data domain models
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical metrics a circuit can report, regardless of firmware naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Temperature,
    Voltage,
    Current,
    Power,
    Resistance,
    Soc,
}

impl Metric {
    pub const ALL: [Metric; 6] = [
        Metric::Temperature,
        Metric::Voltage,
        Metric::Current,
        Metric::Power,
        Metric::Resistance,
        Metric::Soc,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Metric::Temperature => "temperature",
            Metric::Voltage => "voltage",
            Metric::Current => "current",
            Metric::Power => "power",
            Metric::Resistance => "resistance",
            Metric::Soc => "soc",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.key() == key)
    }
}

/// One normalized reading. Absent values are not plotted and do not count
/// toward min/max.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub temperature: Option<f64>,
    pub voltage: Option<f64>,
    pub current: Option<f64>,
    pub power: Option<f64>,
    pub resistance: Option<f64>,
    pub soc: Option<f64>,
    pub status_code: Option<i64>,
}

impl Sample {
    pub fn empty(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            temperature: None,
            voltage: None,
            current: None,
            power: None,
            resistance: None,
            soc: None,
            status_code: None,
        }
    }

    pub fn value(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Temperature => self.temperature,
            Metric::Voltage => self.voltage,
            Metric::Current => self.current,
            Metric::Power => self.power,
            Metric::Resistance => self.resistance,
            Metric::Soc => self.soc,
        }
    }

    pub fn set(&mut self, metric: Metric, value: Option<f64>) {
        let slot = match metric {
            Metric::Temperature => &mut self.temperature,
            Metric::Voltage => &mut self.voltage,
            Metric::Current => &mut self.current,
            Metric::Power => &mut self.power,
            Metric::Resistance => &mut self.resistance,
            Metric::Soc => &mut self.soc,
        };
        *slot = value;
    }

    pub fn with(mut self, metric: Metric, value: f64) -> Self {
        self.set(metric, Some(value));
        self
    }
}

/// Static display configuration for one metric.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricSpec {
    pub key: Metric,
    pub label: String,
    pub unit: String,
    /// Source field names in priority order; the first present one wins.
    pub candidate_source_keys: Vec<String>,
    pub color: String,
    #[serde(default = "default_precision")]
    pub precision: usize,
}

fn default_precision() -> usize {
    2
}

impl MetricSpec {
    pub fn new(
        key: Metric,
        label: &str,
        unit: &str,
        candidate_source_keys: &[&str],
        color: &str,
        precision: usize,
    ) -> Self {
        Self {
            key,
            label: label.to_string(),
            unit: unit.to_string(),
            candidate_source_keys: candidate_source_keys.iter().map(|k| k.to_string()).collect(),
            color: color.to_string(),
            precision,
        }
    }

    /// Fixed-precision value with unit suffix, or `--` when missing.
    pub fn format_value(&self, value: Option<f64>) -> String {
        match value {
            Some(v) => format!("{:.*} {}", self.precision, v, self.unit),
            None => "--".to_string(),
        }
    }

    pub fn title(&self) -> String {
        format!("{} ({})", self.label, self.unit)
    }
}

/// Built-in metric catalog covering the current and legacy report field names.
pub fn default_metric_specs() -> Vec<MetricSpec> {
    vec![
        MetricSpec::new(
            Metric::Temperature,
            "Temperature",
            "°C",
            &["temperature", "MaxTemp", "maxtemp"],
            "#ff6b6b",
            1,
        ),
        MetricSpec::new(
            Metric::Voltage,
            "Voltage",
            "V",
            &["voltage", "PackVol", "avgcellvol"],
            "#4dabf7",
            2,
        ),
        MetricSpec::new(Metric::Current, "Current", "A", &["current", "PackCurr"], "#51cf66", 2),
        MetricSpec::new(Metric::Power, "Power", "W", &["power", "ressocprot"], "#fcc419", 2),
        MetricSpec::new(
            Metric::Resistance,
            "Resistance",
            "Ω",
            &["resistance", "resstatus"],
            "#cc5de8",
            2,
        ),
        MetricSpec::new(Metric::Soc, "State of Charge", "%", &["soc", "SOC"], "#20c997", 1),
    ]
}
