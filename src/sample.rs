// Raw interface samples and their reduction to one aggregate point per tick

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// One interface's throughput as delivered by the sampling layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawInterfaceSample {
    pub interface_name: String,
    pub bits_per_second_in: f64,
    pub bits_per_second_out: f64,
    pub timestamp: f64, // seconds
}

impl RawInterfaceSample {
    pub fn new(name: impl Into<String>, bits_in: f64, bits_out: f64, timestamp: f64) -> Self {
        Self {
            interface_name: name.into(),
            bits_per_second_in: bits_in,
            bits_per_second_out: bits_out,
            timestamp,
        }
    }

    /// Check the numeric fields are usable
    pub fn validate(&self, index: usize) -> Result<(), IngestError> {
        if self.interface_name.is_empty() {
            return Err(IngestError::malformed(index, "empty interface name"));
        }
        for (field, value) in [
            ("bitsPerSecondIn", self.bits_per_second_in),
            ("bitsPerSecondOut", self.bits_per_second_out),
            ("timestamp", self.timestamp),
        ] {
            if !value.is_finite() {
                return Err(IngestError::malformed(index, format!("{field} is not finite")));
            }
            if value < 0.0 {
                return Err(IngestError::malformed(index, format!("{field} is negative")));
            }
        }
        Ok(())
    }

    /// Parse an untyped host payload element
    pub fn from_value(index: usize, value: &Value) -> Result<Self, IngestError> {
        let obj = value
            .as_object()
            .ok_or_else(|| IngestError::malformed(index, "sample is not an object"))?;

        let interface_name = obj
            .get("interfaceName")
            .and_then(Value::as_str)
            .ok_or_else(|| IngestError::malformed(index, "missing interfaceName"))?
            .to_string();

        let number = |field: &str| -> Result<f64, IngestError> {
            obj.get(field)
                .and_then(Value::as_f64)
                .ok_or_else(|| IngestError::malformed(index, format!("missing {field}")))
        };

        let sample = Self {
            interface_name,
            bits_per_second_in: number("bitsPerSecondIn")?,
            bits_per_second_out: number("bitsPerSecondOut")?,
            timestamp: number("timestamp")?,
        };
        sample.validate(index)?;
        Ok(sample)
    }
}

/// Errors the engine handles locally; none of them reach the host
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IngestError {
    #[error("malformed sample #{index}: {reason}")]
    MalformedSample { index: usize, reason: String },
    #[error("stale point at {timestamp} (tail is at {tail})")]
    StaleTimestamp { timestamp: f64, tail: f64 },
}

impl IngestError {
    fn malformed(index: usize, reason: impl Into<String>) -> Self {
        IngestError::MalformedSample {
            index,
            reason: reason.into(),
        }
    }
}

/// Reduced data for one tick. Never mutated once appended to the buffer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatePoint {
    pub timestamp: f64,
    pub total_bits_in: f64,
    pub total_bits_out: f64,
    pub per_interface: BTreeMap<String, RawInterfaceSample>,
}

impl AggregatePoint {
    /// Build a point from an already de-duplicated interface map.
    /// Returns `None` when the map is empty.
    pub fn from_interfaces(per_interface: BTreeMap<String, RawInterfaceSample>) -> Option<Self> {
        let timestamp = per_interface
            .values()
            .map(|s| s.timestamp)
            .fold(None, |acc: Option<f64>, t| Some(acc.map_or(t, |a| a.max(t))))?;

        let total_bits_in = per_interface.values().map(|s| s.bits_per_second_in).sum();
        let total_bits_out = per_interface.values().map(|s| s.bits_per_second_out).sum();

        Some(Self {
            timestamp,
            total_bits_in,
            total_bits_out,
            per_interface,
        })
    }

    /// Inbound or outbound value for an interface; absent interfaces count as zero
    pub fn value_for(&self, name: &str, direction: Direction) -> f64 {
        self.per_interface
            .get(name)
            .map(|s| direction.pick(s))
            .unwrap_or(0.0)
    }

    pub fn total(&self, direction: Direction) -> f64 {
        match direction {
            Direction::In => self.total_bits_in,
            Direction::Out => self.total_bits_out,
        }
    }

    pub fn interface_names(&self) -> impl Iterator<Item = &str> {
        self.per_interface.keys().map(String::as_str)
    }
}

/// Which chart a value belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::In, Direction::Out];

    pub fn pick(&self, sample: &RawInterfaceSample) -> f64 {
        match self {
            Direction::In => sample.bits_per_second_in,
            Direction::Out => sample.bits_per_second_out,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Direction::In => "Inbound",
            Direction::Out => "Outbound",
        }
    }
}

/// Result of reducing one batch
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    pub point: Option<AggregatePoint>,
    pub skipped: Vec<IngestError>,
}

/// Reduces a tick's batch to a single aggregate point
pub struct SampleIngest;

impl SampleIngest {
    /// Keep the newest sample per interface, skip malformed ones, and sum the totals.
    /// An empty (or fully malformed) batch produces no point.
    pub fn reduce(batch: &[RawInterfaceSample]) -> IngestReport {
        let mut skipped = Vec::new();
        let mut latest: BTreeMap<String, RawInterfaceSample> = BTreeMap::new();

        for (index, sample) in batch.iter().enumerate() {
            if let Err(e) = sample.validate(index) {
                log::debug!("Skipping sample: {}", e);
                skipped.push(e);
                continue;
            }

            match latest.get(&sample.interface_name) {
                Some(existing) if existing.timestamp > sample.timestamp => {
                    log::trace!(
                        "Ignoring out-of-order sample for {} at {}",
                        sample.interface_name,
                        sample.timestamp
                    );
                }
                _ => {
                    latest.insert(sample.interface_name.clone(), sample.clone());
                }
            }
        }

        IngestReport {
            point: AggregatePoint::from_interfaces(latest),
            skipped,
        }
    }

    /// Parse an untyped batch, dropping elements that don't look like samples
    pub fn parse_batch(values: &[Value]) -> (Vec<RawInterfaceSample>, Vec<IngestError>) {
        let mut samples = Vec::with_capacity(values.len());
        let mut skipped = Vec::new();

        for (index, value) in values.iter().enumerate() {
            match RawInterfaceSample::from_value(index, value) {
                Ok(sample) => samples.push(sample),
                Err(e) => {
                    log::debug!("Skipping sample: {}", e);
                    skipped.push(e);
                }
            }
        }

        (samples, skipped)
    }
}
