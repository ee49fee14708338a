//! Cached sensor readings consumed by condition evaluation.
//!
//! A [`SensorSnapshot`] is the read-only input the condition language sees.
//! `None` means a reading is unavailable or stale; conditions over it
//! evaluate to `false` rather than erroring.

/// Ranging objects beyond this count are ignored by condition evaluation.
pub const MAX_RANGING_OBJECTS: usize = 4;

/// One tracked ranging (distance) object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangingObject {
    /// Measured distance in centimetres.
    pub distance_cm: f32,
    /// Whether the measurement is usable. Invalid objects are never compared.
    pub valid: bool,
}

/// Point-in-time snapshot of every sensor the condition language can read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorSnapshot {
    /// Scalar temperature reading.
    pub temperature: Option<f32>,
    /// Ambient light level.
    pub light_level: Option<f32>,
    /// Up to [`MAX_RANGING_OBJECTS`] tracked distance objects.
    pub ranging: Vec<RangingObject>,
    /// Threshold-derived motion/proximity state.
    pub motion: Option<bool>,
    /// Local wall-clock hour (0..=23) at snapshot time.
    pub local_hour: Option<u32>,
}

/// Coarse wall-clock bucket reported by the `TIME` sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeOfDay {
    /// Bucket an hour of day (0..=23).
    #[must_use]
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            6..=11 => Self::Morning,
            12..=17 => Self::Afternoon,
            18..=23 => Self::Evening,
            _ => Self::Night,
        }
    }

    /// The comparison text used by the condition language.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Morning => "MORNING",
            Self::Afternoon => "AFTERNOON",
            Self::Evening => "EVENING",
            Self::Night => "NIGHT",
        }
    }
}
