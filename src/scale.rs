// Y-axis maxima with headroom, nice rounding, and hysteresis

use crate::history::RollingBuffer;
use crate::sample::Direction;
use serde::{Deserialize, Serialize};

/// Axis maximum for each chart, in bits per second
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AxisScale {
    pub max_bits_in: f64,
    pub max_bits_out: f64,
}

impl AxisScale {
    pub fn floor(floor: f64) -> Self {
        Self {
            max_bits_in: floor,
            max_bits_out: floor,
        }
    }

    pub fn max_for(&self, direction: Direction) -> f64 {
        match direction {
            Direction::In => self.max_bits_in,
            Direction::Out => self.max_bits_out,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleConfig {
    /// Multiplier applied to the window peak
    pub headroom: f64,
    /// Relative change needed before the axis moves
    pub hysteresis: f64,
    /// Smallest axis maximum
    pub floor: f64,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            headroom: 1.2,
            hysteresis: 0.10,
            floor: 1000.0,
        }
    }
}

/// Rounding unit for a value of this magnitude
pub fn nice_unit(magnitude: f64) -> f64 {
    if magnitude < 1_000.0 {
        100.0
    } else if magnitude < 10_000.0 {
        1_000.0
    } else if magnitude < 100_000.0 {
        10_000.0
    } else if magnitude < 1_000_000.0 {
        100_000.0
    } else if magnitude < 10_000_000.0 {
        1_000_000.0
    } else {
        10_000_000.0
    }
}

/// Peak plus headroom, rounded up to the unit picked by the peak's magnitude
pub fn nice_ceiling(peak: f64, headroom: f64) -> f64 {
    let candidate = peak * headroom;
    let unit = nice_unit(peak);
    (candidate / unit).ceil() * unit
}

/// Keep `current` unless `candidate` differs from it by more than `threshold` (relative)
pub fn apply_hysteresis(current: f64, candidate: f64, threshold: f64) -> f64 {
    if current <= 0.0 {
        return candidate;
    }
    if ((candidate - current) / current).abs() > threshold {
        candidate
    } else {
        current
    }
}

/// Tracks the current axis maxima across recomputes
#[derive(Debug, Clone)]
pub struct ScaleEstimator {
    config: ScaleConfig,
    current: Option<AxisScale>,
}

impl ScaleEstimator {
    pub fn new(config: ScaleConfig) -> Self {
        Self {
            config,
            current: None,
        }
    }

    pub fn recompute(&mut self, buffer: &RollingBuffer) -> AxisScale {
        let max_bits_in = self.recompute_axis(buffer, Direction::In);
        let max_bits_out = self.recompute_axis(buffer, Direction::Out);

        let scale = AxisScale {
            max_bits_in,
            max_bits_out,
        };
        if self.current != Some(scale) {
            log::debug!("Axis scale now in={} out={}", max_bits_in, max_bits_out);
        }
        self.current = Some(scale);
        scale
    }

    fn recompute_axis(&self, buffer: &RollingBuffer, direction: Direction) -> f64 {
        let peak = buffer.peak(direction);
        if peak <= 0.0 {
            log::trace!("{} axis has no traffic, using floor", direction.title());
        }

        let candidate = nice_ceiling(peak, self.config.headroom);
        let adopted = match self.current {
            Some(current) => {
                apply_hysteresis(current.max_for(direction), candidate, self.config.hysteresis)
            }
            None => candidate,
        };

        adopted.max(self.config.floor)
    }

    /// Current maxima, or the floor before the first recompute
    pub fn current(&self) -> AxisScale {
        self.current
            .unwrap_or_else(|| AxisScale::floor(self.config.floor))
    }

    pub fn reset(&mut self) {
        self.current = None;
    }
}

impl Default for ScaleEstimator {
    fn default() -> Self {
        Self::new(ScaleConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{RawInterfaceSample, SampleIngest};

    fn buffer_with(values: &[(f64, f64)]) -> RollingBuffer {
        let mut buffer = RollingBuffer::new(30);
        for (i, (bits_in, bits_out)) in values.iter().enumerate() {
            let point = SampleIngest::reduce(&[RawInterfaceSample::new(
                "eth0", *bits_in, *bits_out, i as f64,
            )])
            .point
            .unwrap();
            buffer.append(point).unwrap();
        }
        buffer
    }

    #[test]
    fn test_nice_ceiling_table() {
        assert_eq!(nice_ceiling(850.0, 1.2), 1100.0);
        assert_eq!(nice_ceiling(5_000.0, 1.2), 6_000.0);
        assert_eq!(nice_ceiling(42_000.0, 1.2), 60_000.0);
        assert_eq!(nice_ceiling(500_000.0, 1.2), 600_000.0);
        assert_eq!(nice_ceiling(2_500_000.0, 1.2), 3_000_000.0);
        assert_eq!(nice_ceiling(95_000_000.0, 1.2), 120_000_000.0);
    }

    #[test]
    fn test_hysteresis() {
        assert_eq!(apply_hysteresis(1000.0, 1050.0, 0.10), 1000.0);
        assert_eq!(apply_hysteresis(1000.0, 1300.0, 0.10), 1300.0);
        assert_eq!(apply_hysteresis(1000.0, 950.0, 0.10), 1000.0);
        assert_eq!(apply_hysteresis(1000.0, 800.0, 0.10), 800.0);
        assert_eq!(apply_hysteresis(0.0, 800.0, 0.10), 800.0);
    }

    #[test]
    fn test_uses_whole_window_peak() {
        let buffer = buffer_with(&[(50_000.0, 10.0), (400_000.0, 20.0), (60_000.0, 30.0)]);
        let scale = ScaleEstimator::default().recompute(&buffer);

        assert_eq!(scale.max_bits_in, 500_000.0);
        assert_eq!(scale.max_bits_out, 1000.0);
    }

    #[test]
    fn test_degenerate_falls_back_to_floor() {
        let buffer = buffer_with(&[(0.0, 0.0), (0.0, 0.0)]);
        let scale = ScaleEstimator::default().recompute(&buffer);
        assert_eq!(scale, AxisScale::floor(1000.0));

        let empty = RollingBuffer::new(5);
        assert_eq!(
            ScaleEstimator::default().recompute(&empty),
            AxisScale::floor(1000.0)
        );
    }

    #[test]
    fn test_small_changes_do_not_rescale() {
        let mut estimator = ScaleEstimator::default();

        let first = estimator.recompute(&buffer_with(&[(500_000.0, 0.0)]));
        assert_eq!(first.max_bits_in, 600_000.0);

        // 520k * 1.2 = 624k -> 700k, a 16% change: adopted
        let second = estimator.recompute(&buffer_with(&[(520_000.0, 0.0)]));
        assert_eq!(second.max_bits_in, 700_000.0);

        // 540k * 1.2 = 648k -> 700k, unchanged
        let third = estimator.recompute(&buffer_with(&[(540_000.0, 0.0)]));
        assert_eq!(third.max_bits_in, 700_000.0);

        // 10M * 1.2 = 12M, rounded in units of 10M
        let fourth = estimator.recompute(&buffer_with(&[(10_000_000.0, 0.0)]));
        assert_eq!(fourth.max_bits_in, 20_000_000.0);
    }

    #[test]
    fn test_hysteresis_holds_near_values() {
        let mut estimator = ScaleEstimator::default();
        // 7_500 * 1.2 = 9_000
        estimator.recompute(&buffer_with(&[(7_500.0, 0.0)]));
        // 8_000 * 1.2 = 9_600 -> 10_000, an 11% change: adopted
        assert_eq!(
            estimator.recompute(&buffer_with(&[(8_000.0, 0.0)])).max_bits_in,
            10_000.0
        );
        // 7_900 * 1.2 = 9_480 -> 10_000, same value
        assert_eq!(
            estimator.recompute(&buffer_with(&[(7_900.0, 0.0)])).max_bits_in,
            10_000.0
        );
        // 7_000 * 1.2 = 8_400 -> 9_000, a 10% change: kept
        assert_eq!(
            estimator.recompute(&buffer_with(&[(7_000.0, 0.0)])).max_bits_in,
            10_000.0
        );
    }

    #[test]
    fn test_reset() {
        let mut estimator = ScaleEstimator::default();
        estimator.recompute(&buffer_with(&[(5_000_000.0, 0.0)]));
        estimator.reset();
        assert_eq!(estimator.current(), AxisScale::floor(1000.0));
    }
}
