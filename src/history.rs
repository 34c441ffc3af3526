// Rolling window of aggregate points for graphing

use crate::sample::{AggregatePoint, Direction, IngestError};
use std::collections::{HashSet, VecDeque};

/// Default number of points to keep (30 points = 30 seconds at 1Hz)
pub const DEFAULT_CAPACITY: usize = 30;

/// What happened to a point handed to [`RollingBuffer::append`]
#[derive(Debug, Clone, PartialEq)]
pub enum AppendOutcome {
    Appended { evicted: Option<AggregatePoint> },
    /// Same timestamp as the tail; the tail was replaced
    Replaced,
}

/// Fixed-capacity, timestamp-ordered window of points (oldest first)
#[derive(Debug, Clone)]
pub struct RollingBuffer {
    points: VecDeque<AggregatePoint>,
    capacity: usize,
}

impl RollingBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Add a point at the tail, evicting from the head once over capacity.
    /// A point older than the tail is refused.
    pub fn append(&mut self, point: AggregatePoint) -> Result<AppendOutcome, IngestError> {
        if let Some(tail) = self.points.back() {
            if point.timestamp < tail.timestamp {
                return Err(IngestError::StaleTimestamp {
                    timestamp: point.timestamp,
                    tail: tail.timestamp,
                });
            }
            if point.timestamp == tail.timestamp {
                if let Some(last) = self.points.back_mut() {
                    *last = point;
                }
                return Ok(AppendOutcome::Replaced);
            }
        }

        self.points.push_back(point);

        let mut evicted = None;
        while self.points.len() > self.capacity {
            evicted = self.points.pop_front();
        }

        Ok(AppendOutcome::Appended { evicted })
    }

    /// Points, oldest first
    pub fn points(&self) -> impl ExactSizeIterator<Item = &AggregatePoint> + DoubleEndedIterator {
        self.points.iter()
    }

    pub fn latest(&self) -> Option<&AggregatePoint> {
        self.points.back()
    }

    pub fn size(&self) -> usize {
        self.points.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// Get the maximum total rate in the window
    pub fn peak(&self, direction: Direction) -> f64 {
        self.points
            .iter()
            .map(|p| p.total(direction))
            .fold(0.0, f64::max)
    }

    /// Every interface that contributes to at least one retained point
    pub fn interfaces_in_window(&self) -> HashSet<&str> {
        self.points.iter().flat_map(|p| p.interface_names()).collect()
    }

    /// Per-tick values of one interface, zero where it was absent
    pub fn series(&self, name: &str, direction: Direction) -> Vec<f64> {
        self.points
            .iter()
            .map(|p| p.value_for(name, direction))
            .collect()
    }
}

impl Default for RollingBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
