//! Real-time multi-series interface traffic charts.
//!
//! [`TrafficEngine`] takes per-interface bit-rate samples once per tick, keeps a
//! bounded rolling window, picks a stable y-axis scale, and draws inbound and
//! outbound area charts onto any [`render::Surface`]. The bundled binary hosts
//! it in a terminal UI.

pub mod config;
pub mod engine;
pub mod format;
pub mod history;
pub mod keybindings;
pub mod monitor;
pub mod registry;
pub mod render;
pub mod sample;
pub mod scale;
pub mod scheduler;
pub mod ui;

pub use engine::{ChartFrame, EngineConfig, TickOutcome, TickReport, TrafficEngine};
pub use registry::{LegendEntry, Rgb};
pub use sample::{AggregatePoint, Direction, IngestError, RawInterfaceSample};
pub use scale::AxisScale;
