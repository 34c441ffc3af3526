//! Redraw scheduling.
//!
//! Mutations only mark the scheduler dirty. The host calls [`RenderScheduler::poll`]
//! once per animation frame and draws at most once when it says so. Resize
//! notifications are debounced separately and trigger a re-measure of the
//! drawing surface through a [`FallbackChain`] before the next draw.

use crate::render::Size;
use std::time::{Duration, Instant};

/// Default resize coalescing window
pub const DEFAULT_RESIZE_DEBOUNCE: Duration = Duration::from_millis(250);

/// Why a redraw was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedrawReason {
    DataAppended,
    VisibilityToggled,
    Resized,
    Mounted,
    Reset,
}

/// What the host should do this frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameAction {
    Idle,
    Draw,
    /// Measure the surface again, then draw
    RemeasureAndDraw,
}

#[derive(Debug)]
pub struct RenderScheduler {
    dirty: bool,
    needs_measure: bool,
    resize_deadline: Option<Instant>,
    resize_debounce: Duration,
    cancelled: bool,
    // Requests folded into the pending frame
    coalesced: u64,
    frames_drawn: u64,
}

impl RenderScheduler {
    pub fn new(resize_debounce: Duration) -> Self {
        Self {
            dirty: false,
            needs_measure: false,
            resize_deadline: None,
            resize_debounce,
            cancelled: true,
            coalesced: 0,
            frames_drawn: 0,
        }
    }

    /// Start accepting requests. The first frame measures the surface.
    pub fn start(&mut self) {
        self.cancelled = false;
        self.needs_measure = true;
        self.request_redraw(RedrawReason::Mounted);
    }

    pub fn request_redraw(&mut self, reason: RedrawReason) {
        if self.cancelled {
            log::trace!("Ignoring redraw request ({:?}) after cancel", reason);
            return;
        }
        if self.dirty {
            self.coalesced += 1;
        }
        self.dirty = true;
    }

    /// Restart the resize debounce window
    pub fn notify_resize(&mut self, now: Instant) {
        if self.cancelled {
            return;
        }
        self.resize_deadline = Some(now + self.resize_debounce);
    }

    /// Frame callback. Returns at most one draw per call no matter how many
    /// requests arrived since the last one.
    pub fn poll(&mut self, now: Instant) -> FrameAction {
        if self.cancelled {
            return FrameAction::Idle;
        }

        if let Some(deadline) = self.resize_deadline {
            if now >= deadline {
                self.resize_deadline = None;
                self.needs_measure = true;
                self.request_redraw(RedrawReason::Resized);
            }
        }

        if !self.dirty {
            return FrameAction::Idle;
        }

        self.dirty = false;
        self.frames_drawn += 1;
        if self.coalesced > 0 {
            log::trace!("Coalesced {} redraw request(s) into one frame", self.coalesced);
            self.coalesced = 0;
        }

        if std::mem::take(&mut self.needs_measure) {
            FrameAction::RemeasureAndDraw
        } else {
            FrameAction::Draw
        }
    }

    /// Earliest time the host needs to call [`poll`](Self::poll) again, if any
    pub fn next_deadline(&self, now: Instant) -> Option<Instant> {
        if self.cancelled {
            return None;
        }
        if self.dirty {
            return Some(now);
        }
        self.resize_deadline
    }

    /// Drop every pending request and refuse new ones until [`start`](Self::start)
    pub fn cancel(&mut self) {
        self.cancelled = true;
        self.dirty = false;
        self.needs_measure = false;
        self.resize_deadline = None;
        self.coalesced = 0;
    }

    pub fn is_pending(&self) -> bool {
        self.dirty || self.resize_deadline.is_some()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }
}

impl Default for RenderScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_RESIZE_DEBOUNCE)
    }
}

/// Something that can report the drawing surface's dimensions
pub trait DimensionSource {
    fn name(&self) -> &str;
    fn measure(&self) -> Option<Size>;
}

/// Dimension source with a fixed answer
#[derive(Debug, Clone)]
pub struct FixedDimensions {
    pub name: String,
    pub size: Option<Size>,
}

impl FixedDimensions {
    pub fn new(name: impl Into<String>, size: Option<Size>) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }
}

impl DimensionSource for FixedDimensions {
    fn name(&self) -> &str {
        &self.name
    }

    fn measure(&self) -> Option<Size> {
        self.size
    }
}

/// Ordered list of sources tried in turn (container -> parent -> viewport)
#[derive(Default)]
pub struct FallbackChain<'a> {
    sources: Vec<&'a dyn DimensionSource>,
}

impl<'a> FallbackChain<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, source: &'a dyn DimensionSource) -> Self {
        self.sources.push(source);
        self
    }

    /// First drawable size, or `None` if every source came up empty
    pub fn measure(&self) -> Option<Size> {
        for source in &self.sources {
            match source.measure() {
                Some(size) if size.is_drawable() => {
                    log::trace!(
                        "Measured {}x{} from {}",
                        size.width,
                        size.height,
                        source.name()
                    );
                    return Some(size);
                }
                other => {
                    log::trace!("{} reported {:?}, trying next source", source.name(), other);
                }
            }
        }
        None
    }
}
