//! Core types shared across chunkflow crates.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Base code for application-defined selection triggers.
pub const TRIGGER_CUSTOM_BASE: u32 = 10_000;

/// Reason a chunk was selected for loading.
///
/// Triggers are informational: they travel with the chunk so telemetry and
/// adaptation logic can inspect them, but nothing in the handoff protocol
/// branches on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionTrigger {
    /// No reason recorded.
    #[default]
    Unspecified,
    /// The first selection for a stream.
    Initial,
    /// Chosen explicitly by the user.
    Manual,
    /// Chosen by bitrate adaptation.
    Adaptive,
    /// Application-defined reason, offset from [`TRIGGER_CUSTOM_BASE`].
    Custom(u32),
}

impl SelectionTrigger {
    /// Stable numeric code for telemetry.
    pub fn code(&self) -> u32 {
        match self {
            Self::Unspecified => 0,
            Self::Initial => 1,
            Self::Manual => 2,
            Self::Adaptive => 3,
            Self::Custom(n) => TRIGGER_CUSTOM_BASE.saturating_add(*n),
        }
    }

    /// Decode a numeric trigger code.
    ///
    /// Unknown codes below the custom base map to `Unspecified`.
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => Self::Initial,
            2 => Self::Manual,
            3 => Self::Adaptive,
            n if n >= TRIGGER_CUSTOM_BASE => Self::Custom(n - TRIGGER_CUSTOM_BASE),
            _ => Self::Unspecified,
        }
    }
}

impl std::fmt::Display for SelectionTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unspecified => write!(f, "unspecified"),
            Self::Initial => write!(f, "initial"),
            Self::Manual => write!(f, "manual"),
            Self::Adaptive => write!(f, "adaptive"),
            Self::Custom(n) => write!(f, "custom({n})"),
        }
    }
}

/// Media time range in microseconds, `start_us <= end_us`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawTimeRange")]
pub struct TimeRange {
    start_us: u64,
    end_us: u64,
}

#[derive(Deserialize)]
struct RawTimeRange {
    start_us: u64,
    end_us: u64,
}

impl TryFrom<RawTimeRange> for TimeRange {
    type Error = Error;

    fn try_from(raw: RawTimeRange) -> Result<Self> {
        Self::new(raw.start_us, raw.end_us)
    }
}

impl TimeRange {
    /// Create a time range, rejecting `end_us < start_us`.
    pub fn new(start_us: u64, end_us: u64) -> Result<Self> {
        if end_us < start_us {
            return Err(Error::invalid_input(format!(
                "time range ends before it starts: {start_us}us > {end_us}us"
            )));
        }
        Ok(Self { start_us, end_us })
    }

    /// Start of the range in microseconds.
    pub fn start_us(&self) -> u64 {
        self.start_us
    }

    /// End of the range in microseconds.
    pub fn end_us(&self) -> u64 {
        self.end_us
    }

    /// Length of the range in microseconds.
    pub fn duration_us(&self) -> u64 {
        self.end_us - self.start_us
    }

    /// Whether `time_us` falls inside `[start_us, end_us)`.
    pub fn contains(&self, time_us: u64) -> bool {
        time_us >= self.start_us && time_us < self.end_us
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_codes() {
        assert_eq!(SelectionTrigger::Unspecified.code(), 0);
        assert_eq!(SelectionTrigger::Initial.code(), 1);
        assert_eq!(SelectionTrigger::Manual.code(), 2);
        assert_eq!(SelectionTrigger::Adaptive.code(), 3);
        assert_eq!(SelectionTrigger::Custom(7).code(), 10_007);

        assert_eq!(SelectionTrigger::from_code(3), SelectionTrigger::Adaptive);
        assert_eq!(
            SelectionTrigger::from_code(10_042),
            SelectionTrigger::Custom(42)
        );
        assert_eq!(SelectionTrigger::from_code(99), SelectionTrigger::Unspecified);
    }

    #[test]
    fn test_trigger_serde() {
        let json = serde_json::to_string(&SelectionTrigger::Adaptive).unwrap();
        assert_eq!(json, "\"adaptive\"");

        let custom: SelectionTrigger = serde_json::from_str(r#"{"custom":5}"#).unwrap();
        assert_eq!(custom, SelectionTrigger::Custom(5));
    }

    #[test]
    fn test_time_range_validation() {
        let range = TimeRange::new(1_000, 5_000).unwrap();
        assert_eq!(range.duration_us(), 4_000);
        assert!(range.contains(1_000));
        assert!(!range.contains(5_000));

        assert!(TimeRange::new(5, 5).is_ok());
        assert!(matches!(TimeRange::new(6, 5), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_time_range_deserialize_rejects_inverted() {
        let ok: TimeRange = serde_json::from_str(r#"{"start_us":0,"end_us":10}"#).unwrap();
        assert_eq!(ok.end_us(), 10);

        let err = serde_json::from_str::<TimeRange>(r#"{"start_us":10,"end_us":0}"#);
        assert!(err.is_err());
    }
}
