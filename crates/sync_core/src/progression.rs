use shared::domain::{HueValue, MAX_HUE};

/// How the cycle hue advances from one tick to the next.
#[derive(Debug, Clone, PartialEq)]
pub enum HueProgression {
    /// Constant step per tick around the whole wheel.
    Continuous { increment: f64 },
    /// Holds `hues[0]`, then `hues[1]`, swapping every `every_ticks` ticks.
    Alternating {
        hues: [HueValue; 2],
        every_ticks: u64,
    },
}

impl HueProgression {
    /// Full wheel (65535 steps) spread over `cycle_time_secs` ticks.
    pub fn continuous(cycle_time_secs: f64) -> Self {
        let cycle_time_secs = if cycle_time_secs.is_finite() && cycle_time_secs > 0.0 {
            cycle_time_secs
        } else {
            1.0
        };
        Self::Continuous {
            increment: f64::from(MAX_HUE) / cycle_time_secs,
        }
    }

    pub fn alternating(first: HueValue, second: HueValue, every_ticks: u64) -> Self {
        Self::Alternating {
            hues: [first, second],
            every_ticks: every_ticks.max(1),
        }
    }

    /// Hue pushed on 1-based tick `tick`.
    ///
    /// Continuous hues are computed from the tick count rather than
    /// accumulated, so fractional increments never drift.
    pub fn hue_at(&self, tick: u64) -> HueValue {
        match self {
            Self::Continuous { increment } => HueValue::from_position(tick as f64 * increment),
            Self::Alternating { hues, every_ticks } => {
                let phase = tick.saturating_sub(1) / (*every_ticks).max(1);
                hues[(phase % 2) as usize]
            }
        }
    }
}

impl Default for HueProgression {
    fn default() -> Self {
        Self::continuous(15.0)
    }
}
