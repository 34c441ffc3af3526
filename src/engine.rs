//! The visualization engine: owns the rolling buffer, series registry, axis
//! scale, and redraw scheduler for one mounted chart widget.
//!
//! Pipeline per tick: samples -> [`SampleIngest`] -> [`RollingBuffer`] (+ registry)
//! -> [`ScaleEstimator`] -> scheduler. Drawing happens only from
//! [`TrafficEngine::poll_frame`], never inside the tick.

use crate::history::{AppendOutcome, DEFAULT_CAPACITY, RollingBuffer};
use crate::registry::{LegendEntry, SeriesRegistry};
use crate::render::{ChartRenderer, ChartStyle, DisplayList, Size};
use crate::sample::{Direction, IngestError, RawInterfaceSample, SampleIngest};
use crate::scale::{AxisScale, ScaleConfig, ScaleEstimator};
use crate::scheduler::{
    DEFAULT_RESIZE_DEBOUNCE, FallbackChain, FrameAction, RedrawReason, RenderScheduler,
};
use serde::Serialize;
use serde_json::Value;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub capacity: usize,
    pub resize_debounce: Duration,
    pub scale: ScaleConfig,
    pub style: ChartStyle,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            resize_debounce: DEFAULT_RESIZE_DEBOUNCE,
            scale: ScaleConfig::default(),
            style: ChartStyle::default(),
        }
    }
}

/// What a tick did to the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Empty batch, nothing usable in it, or the engine isn't mounted
    NoData,
    Appended { evicted: bool },
    Replaced,
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub outcome: TickOutcome,
    pub skipped: usize,
}

/// Both charts as drawn for one frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartFrame {
    pub scale: AxisScale,
    pub inbound: DisplayList,
    pub outbound: DisplayList,
}

impl ChartFrame {
    pub fn for_direction(&self, direction: Direction) -> &DisplayList {
        match direction {
            Direction::In => &self.inbound,
            Direction::Out => &self.outbound,
        }
    }
}

pub struct TrafficEngine {
    buffer: RollingBuffer,
    registry: SeriesRegistry,
    scale: ScaleEstimator,
    scheduler: RenderScheduler,
    renderer: ChartRenderer,
    surface_size: Option<Size>,
    mounted: bool,
}

impl TrafficEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            buffer: RollingBuffer::new(config.capacity),
            registry: SeriesRegistry::new(),
            scale: ScaleEstimator::new(config.scale),
            scheduler: RenderScheduler::new(config.resize_debounce),
            renderer: ChartRenderer::new(config.style),
            surface_size: None,
            mounted: false,
        }
    }

    /// Interfaces that should start hidden when they first appear
    pub fn with_hidden<I, S>(mut self, hidden: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.registry = SeriesRegistry::with_hidden(hidden);
        self
    }

    /// Widget is on screen: accept ticks and schedule the first (measuring) frame
    pub fn mount(&mut self) {
        log::debug!("Traffic engine mounted");
        self.mounted = true;
        self.scheduler.start();
    }

    /// Widget left the screen: cancel pending frames and start the next mount cold
    pub fn unmount(&mut self) {
        log::debug!("Traffic engine unmounted");
        self.mounted = false;
        self.scheduler.cancel();
        self.clear();
        self.surface_size = None;
    }

    /// Session reset while mounted (e.g. logout): empty everything and redraw
    pub fn reset(&mut self) {
        log::info!("Resetting traffic session");
        self.clear();
        self.scheduler.request_redraw(RedrawReason::Reset);
    }

    fn clear(&mut self) {
        self.buffer.clear();
        self.registry.clear();
        self.scale.reset();
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Feed one tick's batch
    pub fn ingest(&mut self, batch: &[RawInterfaceSample]) -> TickReport {
        if !self.mounted {
            log::debug!("Dropping batch of {} sample(s): not mounted", batch.len());
            return TickReport {
                outcome: TickOutcome::NoData,
                skipped: 0,
            };
        }

        let report = SampleIngest::reduce(batch);
        let skipped = report.skipped.len();

        let Some(point) = report.point else {
            log::trace!("No new data this tick");
            return TickReport {
                outcome: TickOutcome::NoData,
                skipped,
            };
        };

        let names: Vec<String> = point.interface_names().map(str::to_string).collect();

        let outcome = match self.buffer.append(point) {
            Ok(AppendOutcome::Appended { evicted }) => TickOutcome::Appended {
                evicted: evicted.is_some(),
            },
            Ok(AppendOutcome::Replaced) => TickOutcome::Replaced,
            Err(e @ IngestError::StaleTimestamp { .. }) => {
                log::debug!("{}", e);
                return TickReport {
                    outcome: TickOutcome::Stale,
                    skipped,
                };
            }
            Err(e) => {
                log::debug!("{}", e);
                return TickReport {
                    outcome: TickOutcome::NoData,
                    skipped,
                };
            }
        };

        // Only names that made it into the window get a color
        for name in &names {
            self.registry.ensure(name);
        }
        let in_window = self.buffer.interfaces_in_window();
        self.registry.sync_active(&in_window);
        self.scale.recompute(&self.buffer);
        self.scheduler.request_redraw(RedrawReason::DataAppended);

        TickReport { outcome, skipped }
    }

    /// Feed one tick's batch from untyped host data
    pub fn ingest_values(&mut self, values: &[Value]) -> TickReport {
        let (samples, skipped) = SampleIngest::parse_batch(values);
        let mut report = self.ingest(&samples);
        report.skipped += skipped.len();
        report
    }

    /// Flip an interface's visibility; `None` if the name is unknown
    pub fn toggle(&mut self, name: &str) -> Option<bool> {
        let hidden = self.registry.toggle(name)?;
        log::debug!("{} is now {}", name, if hidden { "hidden" } else { "visible" });
        self.scheduler.request_redraw(RedrawReason::VisibilityToggled);
        Some(hidden)
    }

    pub fn show_all(&mut self) {
        self.registry.show_all();
        self.scheduler.request_redraw(RedrawReason::VisibilityToggled);
    }

    pub fn legend(&self) -> Vec<LegendEntry> {
        self.registry.legend()
    }

    /// Container resized; coalesced over the debounce window
    pub fn notify_resize(&mut self, now: Instant) {
        self.scheduler.notify_resize(now);
    }

    pub fn notify_orientation_change(&mut self, now: Instant) {
        self.scheduler.notify_resize(now);
    }

    /// Animation-frame callback. Returns a frame when one is due and the
    /// surface has a usable size.
    pub fn poll_frame(&mut self, now: Instant, chain: &FallbackChain<'_>) -> Option<ChartFrame> {
        let remeasure = match self.scheduler.poll(now) {
            FrameAction::Idle => return None,
            FrameAction::RemeasureAndDraw => true,
            // A surface that was unavailable is measured again on every trigger
            FrameAction::Draw => !self.surface_size.is_some_and(|size| size.is_drawable()),
        };
        if remeasure {
            self.surface_size = chain.measure();
        }

        let Some(size) = self.surface_size.filter(Size::is_drawable) else {
            log::debug!("Drawing surface unavailable, waiting for the next trigger");
            return None;
        };

        Some(self.render(size))
    }

    /// Draw both charts right now at the given size
    pub fn render(&self, size: Size) -> ChartFrame {
        let scale = self.scale.current();
        let mut inbound = DisplayList::new(size);
        let mut outbound = DisplayList::new(size);

        self.renderer
            .render(&mut inbound, &self.buffer, Direction::In, &scale, &self.registry);
        self.renderer
            .render(&mut outbound, &self.buffer, Direction::Out, &scale, &self.registry);

        ChartFrame {
            scale,
            inbound,
            outbound,
        }
    }

    /// When the host must call [`poll_frame`](Self::poll_frame) next
    pub fn next_deadline(&self, now: Instant) -> Option<Instant> {
        self.scheduler.next_deadline(now)
    }

    pub fn buffer(&self) -> &RollingBuffer {
        &self.buffer
    }

    pub fn registry(&self) -> &SeriesRegistry {
        &self.registry
    }

    pub fn axis_scale(&self) -> AxisScale {
        self.scale.current()
    }

    pub fn surface_size(&self) -> Option<Size> {
        self.surface_size
    }

    pub fn hidden_interfaces(&self) -> Vec<String> {
        self.registry.hidden_names()
    }
}

impl Default for TrafficEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{DrawCommand, Surface};
    use crate::scheduler::FixedDimensions;

    fn mounted() -> TrafficEngine {
        let mut engine = TrafficEngine::default();
        engine.mount();
        engine
    }

    fn tick(engine: &mut TrafficEngine, ts: f64, samples: &[(&str, f64, f64)]) -> TickReport {
        let batch: Vec<RawInterfaceSample> = samples
            .iter()
            .map(|(name, bits_in, bits_out)| RawInterfaceSample::new(*name, *bits_in, *bits_out, ts))
            .collect();
        engine.ingest(&batch)
    }

    fn series_strokes(list: &DisplayList, color: crate::registry::Rgb) -> usize {
        list.commands()
            .iter()
            .filter(|c| matches!(c, DrawCommand::Stroke { stroke, .. } if stroke.paint.color == color))
            .count()
    }

    fn fills(list: &DisplayList) -> usize {
        list.commands()
            .iter()
            .filter(|c| matches!(c, DrawCommand::Fill { .. }))
            .count()
    }

    #[test]
    fn test_scenario_single_tick() {
        let mut engine = mounted();
        tick(&mut engine, 1.0, &[("eth0", 500_000.0, 200_000.0)]);

        assert_eq!(engine.buffer().size(), 1);
        let point = engine.buffer().latest().unwrap();
        assert_eq!(point.total_bits_in, 500_000.0);
        assert_eq!(point.total_bits_out, 200_000.0);
        assert!(engine.registry().color("eth0").is_some());

        let frame = engine.render(Size::new(400.0, 200.0));
        assert_eq!(fills(&frame.inbound), 0);
        assert_eq!(fills(&frame.outbound), 0);
        assert!(frame.inbound.texts().count() > 0);
    }

    #[test]
    fn test_scenario_capacity_eviction() {
        let mut engine = mounted();

        for i in 0..31 {
            tick(&mut engine, i as f64, &[("eth0", 1000.0 + i as f64, 10.0)]);
        }

        assert_eq!(engine.buffer().size(), 30);
        assert!(engine.buffer().points().all(|p| p.timestamp != 0.0));
        assert_eq!(engine.buffer().points().next().unwrap().timestamp, 1.0);
    }

    #[test]
    fn test_scenario_new_interface() {
        let mut engine = mounted();
        tick(&mut engine, 1.0, &[("eth0", 100.0, 10.0)]);
        let eth0 = engine.registry().color("eth0").unwrap();

        tick(&mut engine, 2.0, &[("eth0", 100.0, 10.0), ("eth1", 250.0, 40.0)]);

        assert_eq!(engine.registry().len(), 2);
        assert_eq!(engine.registry().color("eth0"), Some(eth0));
        assert_ne!(engine.registry().color("eth1"), Some(eth0));
        let latest = engine.buffer().latest().unwrap();
        assert_eq!(latest.total_bits_in, 350.0);
        assert_eq!(latest.total_bits_out, 50.0);
    }

    #[test]
    fn test_scenario_hidden_interface() {
        let mut engine = mounted();
        tick(&mut engine, 1.0, &[("eth0", 100.0, 10.0), ("eth1", 50.0, 5.0)]);
        tick(&mut engine, 2.0, &[("eth0", 200.0, 20.0), ("eth1", 60.0, 6.0)]);
        let eth0 = engine.registry().color("eth0").unwrap();
        let eth1 = engine.registry().color("eth1").unwrap();

        assert_eq!(engine.toggle("eth0"), Some(true));
        let frame = engine.render(Size::new(400.0, 200.0));

        assert_eq!(series_strokes(&frame.inbound, eth0), 0);
        assert_eq!(series_strokes(&frame.inbound, eth1), 1);
        assert_eq!(fills(&frame.inbound), 1);

        let legend = engine.legend();
        assert_eq!(legend[0].name, "eth0");
        assert!(legend[0].hidden);
        assert_eq!(legend[1].name, "eth1");
        assert!(!legend[1].hidden);
    }

    #[test]
    fn test_absent_interface_drops_to_zero() {
        let mut engine = mounted();
        tick(&mut engine, 1.0, &[("eth0", 100.0, 10.0), ("eth1", 50.0, 5.0)]);
        tick(&mut engine, 2.0, &[("eth0", 100.0, 10.0)]);

        assert_eq!(engine.buffer().latest().unwrap().total_bits_in, 100.0);
        assert_eq!(engine.buffer().series("eth1", Direction::In), vec![50.0, 0.0]);
        // Still in the window, so still plotted
        assert_eq!(engine.legend().len(), 2);
    }

    #[test]
    fn test_interface_pruned_after_leaving_window() {
        let mut engine = TrafficEngine::new(EngineConfig {
            capacity: 2,
            ..EngineConfig::default()
        });
        engine.mount();
        tick(&mut engine, 1.0, &[("eth0", 1.0, 1.0), ("eth1", 1.0, 1.0)]);
        let eth0 = engine.registry().color("eth0");
        tick(&mut engine, 2.0, &[("eth1", 1.0, 1.0)]);
        tick(&mut engine, 3.0, &[("eth1", 1.0, 1.0)]);

        let names: Vec<String> = engine.legend().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["eth1"]);
        assert_eq!(engine.registry().color("eth0"), eth0);
    }

    #[test]
    fn test_empty_batch_is_not_an_error() {
        let mut engine = mounted();
        let report = engine.ingest(&[]);
        assert_eq!(report.outcome, TickOutcome::NoData);
        assert!(engine.buffer().is_empty());
    }

    #[test]
    fn test_stale_tick_is_dropped() {
        let mut engine = mounted();
        tick(&mut engine, 5.0, &[("eth0", 1.0, 1.0)]);
        let report = tick(&mut engine, 4.0, &[("eth0", 9.0, 9.0)]);

        assert_eq!(report.outcome, TickOutcome::Stale);
        assert_eq!(engine.buffer().size(), 1);
    }

    #[test]
    fn test_ingest_values_counts_malformed() {
        let mut engine = mounted();
        let values = vec![
            serde_json::json!({"interfaceName": "eth0", "bitsPerSecondIn": 10.0, "bitsPerSecondOut": 5.0, "timestamp": 1.0}),
            serde_json::json!({"interfaceName": "eth1"}),
        ];

        let report = engine.ingest_values(&values);

        assert_eq!(report.skipped, 1);
        assert_eq!(report.outcome, TickOutcome::Appended { evicted: false });
    }

    #[test]
    fn test_poll_frame_draws_once_per_frame() {
        let mut engine = mounted();
        let viewport = FixedDimensions::new("viewport", Some(Size::new(300.0, 100.0)));
        let chain = FallbackChain::new().then(&viewport);
        let now = Instant::now();

        tick(&mut engine, 1.0, &[("eth0", 1.0, 1.0)]);
        tick(&mut engine, 2.0, &[("eth0", 2.0, 1.0)]);
        engine.toggle("eth0");

        let frame = engine.poll_frame(now, &chain).unwrap();
        assert_eq!(frame.inbound.size(), Some(Size::new(300.0, 100.0)));
        assert!(engine.poll_frame(now, &chain).is_none());
    }

    #[test]
    fn test_unavailable_surface_skips_frame() {
        let mut engine = mounted();
        let empty = FixedDimensions::new("container", None);
        let chain = FallbackChain::new().then(&empty);

        tick(&mut engine, 1.0, &[("eth0", 1.0, 1.0)]);
        assert!(engine.poll_frame(Instant::now(), &chain).is_none());
        assert!(engine.surface_size().is_none());
    }

    #[test]
    fn test_surface_measured_once_available() {
        let mut engine = mounted();
        let now = Instant::now();
        let empty = FixedDimensions::new("container", None);
        assert!(engine.poll_frame(now, &FallbackChain::new().then(&empty)).is_none());

        let sized = FixedDimensions::new("container", Some(Size::new(300.0, 100.0)));
        let chain = FallbackChain::new().then(&sized);
        tick(&mut engine, 1.0, &[("eth0", 1.0, 1.0)]);

        let frame = engine.poll_frame(now, &chain).unwrap();
        assert_eq!(frame.inbound.size(), Some(Size::new(300.0, 100.0)));
        assert_eq!(engine.surface_size(), Some(Size::new(300.0, 100.0)));
    }

    #[test]
    fn test_stale_interfaces_not_registered() {
        let mut engine = mounted();
        tick(&mut engine, 5.0, &[("eth0", 1.0, 1.0)]);

        let report = tick(&mut engine, 4.0, &[("ghost0", 1.0, 1.0)]);

        assert_eq!(report.outcome, TickOutcome::Stale);
        let names: Vec<String> = engine.legend().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["eth0"]);
        assert_eq!(engine.registry().len(), 1);

        tick(&mut engine, 6.0, &[("eth0", 1.0, 1.0), ("eth1", 1.0, 1.0)]);
        assert_eq!(
            engine.registry().color("eth1"),
            Some(crate::registry::PALETTE[1])
        );
    }

    #[test]
    fn test_resize_remeasures() {
        let mut engine = mounted();
        let t0 = Instant::now();
        let small = FixedDimensions::new("container", Some(Size::new(100.0, 50.0)));
        engine.poll_frame(t0, &FallbackChain::new().then(&small));

        let large = FixedDimensions::new("container", Some(Size::new(400.0, 120.0)));
        let chain = FallbackChain::new().then(&large);
        engine.notify_resize(t0);

        assert!(engine.poll_frame(t0 + Duration::from_millis(100), &chain).is_none());
        let frame = engine
            .poll_frame(t0 + Duration::from_millis(250), &chain)
            .unwrap();
        assert_eq!(frame.outbound.size(), Some(Size::new(400.0, 120.0)));
    }

    #[test]
    fn test_unmount_cancels_and_starts_cold() {
        let mut engine = mounted();
        let viewport = FixedDimensions::new("viewport", Some(Size::new(300.0, 100.0)));
        let chain = FallbackChain::new().then(&viewport);
        let now = Instant::now();

        tick(&mut engine, 1.0, &[("eth0", 1.0, 1.0)]);
        engine.notify_resize(now);
        engine.unmount();

        assert!(engine.buffer().is_empty());
        assert!(engine.registry().is_empty());
        assert!(engine.poll_frame(now + Duration::from_secs(1), &chain).is_none());
        assert_eq!(tick(&mut engine, 2.0, &[("eth0", 1.0, 1.0)]).outcome, TickOutcome::NoData);

        engine.mount();
        tick(&mut engine, 3.0, &[("eth0", 1.0, 1.0)]);
        assert_eq!(engine.buffer().size(), 1);
        assert!(engine.poll_frame(now, &chain).is_some());
    }

    #[test]
    fn test_reset_while_mounted() {
        let mut engine = mounted();
        tick(&mut engine, 1.0, &[("eth0", 5_000_000.0, 1.0)]);
        engine.reset();

        assert!(engine.buffer().is_empty());
        assert!(engine.legend().is_empty());
        assert_eq!(engine.axis_scale(), AxisScale::floor(1000.0));
    }
}
