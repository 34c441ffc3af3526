// Interface counter sources and conversion of cumulative counters to bit rates

use crate::sample::RawInterfaceSample;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

/// Cumulative byte counters for one interface
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceCounters {
    pub name: String,
    pub bytes_received: Option<u64>,
    pub bytes_transmitted: Option<u64>,
}

/// Counters for every interface at one instant
#[derive(Debug, Clone, PartialEq)]
pub struct CounterSnapshot {
    pub time: f64, // seconds
    pub interfaces: HashMap<String, InterfaceCounters>,
}

impl CounterSnapshot {
    pub fn new(time: f64) -> Self {
        Self {
            time,
            interfaces: HashMap::new(),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, counters: InterfaceCounters) {
        self.interfaces.insert(key.into(), counters);
    }
}

/// Traffic payload as served by the appliance's diagnostics endpoint.
/// Counters arrive as decimal strings.
#[derive(Debug, Clone, Deserialize)]
pub struct TrafficPayload {
    pub interfaces: BTreeMap<String, PayloadInterface>,
    pub time: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PayloadInterface {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub device: String,
    #[serde(rename = "bytes received", default)]
    pub bytes_received: String,
    #[serde(rename = "bytes transmitted", default)]
    pub bytes_transmitted: String,
}

impl From<TrafficPayload> for CounterSnapshot {
    fn from(payload: TrafficPayload) -> Self {
        let mut snapshot = CounterSnapshot::new(payload.time);
        for (key, iface) in payload.interfaces {
            let name = if iface.name.is_empty() {
                iface.device.clone()
            } else {
                iface.name.clone()
            };
            snapshot.insert(
                key,
                InterfaceCounters {
                    name,
                    bytes_received: iface.bytes_received.trim().parse().ok(),
                    bytes_transmitted: iface.bytes_transmitted.trim().parse().ok(),
                },
            );
        }
        snapshot
    }
}

/// Turns consecutive counter snapshots into per-interface bit rates
#[derive(Debug, Default)]
pub struct RateTracker {
    previous: Option<CounterSnapshot>,
}

impl RateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rates since the previous snapshot. The first snapshot only primes the tracker.
    pub fn update(&mut self, snapshot: CounterSnapshot) -> Vec<RawInterfaceSample> {
        let Some(previous) = &self.previous else {
            self.previous = Some(snapshot);
            return Vec::new();
        };

        let elapsed = snapshot.time - previous.time;
        if elapsed <= 0.0 {
            log::debug!(
                "Ignoring counter snapshot at {} (previous at {})",
                snapshot.time,
                previous.time
            );
            return Vec::new();
        }

        let mut samples = Vec::new();
        for (key, current) in &snapshot.interfaces {
            let Some(before) = previous.interfaces.get(key) else {
                continue;
            };
            if current.name.is_empty() {
                continue;
            }

            let (Some(rx), Some(tx), Some(prev_rx), Some(prev_tx)) = (
                current.bytes_received,
                current.bytes_transmitted,
                before.bytes_received,
                before.bytes_transmitted,
            ) else {
                log::debug!("Unreadable counters for {}, skipping", current.name);
                continue;
            };

            samples.push(RawInterfaceSample::new(
                current.name.clone(),
                bits_per_second(rx, prev_rx, elapsed),
                bits_per_second(tx, prev_tx, elapsed),
                snapshot.time,
            ));
        }

        samples.sort_by(|a, b| a.interface_name.cmp(&b.interface_name));
        self.previous = Some(snapshot);
        samples
    }

    pub fn reset(&mut self) {
        self.previous = None;
    }
}

// A counter that went backwards was reset; count from zero
fn bits_per_second(current: u64, previous: u64, elapsed: f64) -> f64 {
    let delta = if current >= previous {
        current - previous
    } else {
        current
    };
    delta as f64 * 8.0 / elapsed
}

fn now_seconds() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Something that can read interface counters
pub trait CounterSource: Send {
    fn name(&self) -> &'static str;

    /// `Ok(None)` once the source is exhausted
    fn read_counters(&mut self) -> Result<Option<CounterSnapshot>>;
}

/// `/proc/net/dev`
#[cfg(all(target_os = "linux", feature = "source-procfs"))]
pub struct ProcfsSource;

#[cfg(all(target_os = "linux", feature = "source-procfs"))]
impl CounterSource for ProcfsSource {
    fn name(&self) -> &'static str {
        "procfs"
    }

    fn read_counters(&mut self) -> Result<Option<CounterSnapshot>> {
        let devices = procfs::net::dev_status().context("Failed to read /proc/net/dev")?;
        let mut snapshot = CounterSnapshot::new(now_seconds());
        for (name, status) in devices {
            snapshot.insert(
                name.clone(),
                InterfaceCounters {
                    name,
                    bytes_received: Some(status.recv_bytes),
                    bytes_transmitted: Some(status.sent_bytes),
                },
            );
        }
        Ok(Some(snapshot))
    }
}

/// Cross-platform totals from sysinfo
#[cfg(feature = "source-sysinfo")]
pub struct SysinfoSource {
    networks: sysinfo::Networks,
}

#[cfg(feature = "source-sysinfo")]
impl SysinfoSource {
    pub fn new() -> Self {
        Self {
            networks: sysinfo::Networks::new_with_refreshed_list(),
        }
    }
}

#[cfg(feature = "source-sysinfo")]
impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "source-sysinfo")]
impl CounterSource for SysinfoSource {
    fn name(&self) -> &'static str {
        "sysinfo"
    }

    fn read_counters(&mut self) -> Result<Option<CounterSnapshot>> {
        self.networks.refresh();
        let mut snapshot = CounterSnapshot::new(now_seconds());
        for (name, data) in self.networks.iter() {
            snapshot.insert(
                name.clone(),
                InterfaceCounters {
                    name: name.clone(),
                    bytes_received: Some(data.total_received()),
                    bytes_transmitted: Some(data.total_transmitted()),
                },
            );
        }
        Ok(Some(snapshot))
    }
}

/// JSON-lines file of recorded traffic payloads, one per tick
pub struct ReplaySource {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    line_number: usize,
}

impl ReplaySource {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).context(format!("Failed to open replay file: {:?}", path))?;
        Ok(Self {
            path: path.to_path_buf(),
            lines: BufReader::new(file).lines(),
            line_number: 0,
        })
    }
}

impl CounterSource for ReplaySource {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn read_counters(&mut self) -> Result<Option<CounterSnapshot>> {
        loop {
            let Some(line) = self.lines.next() else {
                log::info!("Replay file {:?} exhausted", self.path);
                return Ok(None);
            };
            self.line_number += 1;
            let line = line.context(format!("Failed to read {:?}", self.path))?;
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<TrafficPayload>(&line) {
                Ok(payload) => return Ok(Some(payload.into())),
                Err(e) => {
                    log::warn!(
                        "Skipping malformed payload at {:?}:{}: {}",
                        self.path,
                        self.line_number,
                        e
                    );
                }
            }
        }
    }
}

/// Compiled-in source and whether it works here
#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub name: &'static str,
    pub available: bool,
    pub description: &'static str,
}

pub fn detect_sources() -> Vec<SourceInfo> {
    #[allow(unused_mut)]
    let mut sources = Vec::new();

    #[cfg(all(target_os = "linux", feature = "source-procfs"))]
    sources.push(SourceInfo {
        name: "procfs",
        available: Path::new("/proc/net/dev").exists(),
        description: "Linux /proc/net/dev counters",
    });

    #[cfg(feature = "source-sysinfo")]
    sources.push(SourceInfo {
        name: "sysinfo",
        available: true,
        description: "Cross-platform interface totals",
    });

    sources.push(SourceInfo {
        name: "replay",
        available: true,
        description: "Recorded traffic payloads (--replay <FILE>)",
    });

    sources
}

/// Pick a counter source by name, or the best available one
pub fn select_source(preference: Option<&str>, replay: Option<&Path>) -> Result<Box<dyn CounterSource>> {
    if let Some(path) = replay {
        return Ok(Box::new(ReplaySource::open(path)?));
    }

    match preference {
        #[cfg(all(target_os = "linux", feature = "source-procfs"))]
        Some("procfs") => Ok(Box::new(ProcfsSource)),
        #[cfg(feature = "source-sysinfo")]
        Some("sysinfo") => Ok(Box::new(SysinfoSource::new())),
        Some("replay") => anyhow::bail!("The replay source needs --replay <FILE>"),
        Some(other) => anyhow::bail!("Unknown or unavailable counter source: {}", other),
        None => {
            for info in detect_sources() {
                if !info.available {
                    continue;
                }
                match info.name {
                    #[cfg(all(target_os = "linux", feature = "source-procfs"))]
                    "procfs" => return Ok(Box::new(ProcfsSource)),
                    #[cfg(feature = "source-sysinfo")]
                    "sysinfo" => return Ok(Box::new(SysinfoSource::new())),
                    _ => {}
                }
            }
            anyhow::bail!("No counter source available; use --replay <FILE>")
        }
    }
}

/// Periodic sampling task. Aborted when dropped.
pub struct Sampler {
    handle: JoinHandle<()>,
}

impl Sampler {
    /// Poll `source` every `period` and send each tick's samples down `tx`
    pub fn spawn(
        mut source: Box<dyn CounterSource>,
        period: Duration,
        tx: mpsc::Sender<Vec<RawInterfaceSample>>,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut rates = RateTracker::new();
            log::debug!("Sampler started using {} every {:?}", source.name(), period);

            loop {
                ticker.tick().await;
                let snapshot = match source.read_counters() {
                    Ok(Some(snapshot)) => snapshot,
                    Ok(None) => break,
                    Err(e) => {
                        log::warn!("Error reading counters from {}: {:#}", source.name(), e);
                        continue;
                    }
                };

                let batch = rates.update(snapshot);
                if tx.send(batch).await.is_err() {
                    break;
                }
            }
            log::debug!("Sampler stopped");
        });

        Self { handle }
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
