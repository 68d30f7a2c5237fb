use std::collections::HashMap;

use super::EngineError;

const MS_PER_MINUTE: i64 = 60_000;
const MS_PER_HOUR: i64 = 3_600_000;
const MS_PER_DAY: i64 = 86_400_000;

/// Named candle durations.
///
/// All timeframes a session may reference are registered up front; looking up
/// a name that was never registered is a configuration error, not a silent
/// fallback.
#[derive(Debug, Clone)]
pub struct TimeframeRegistry {
    durations: HashMap<String, i64>,
}

impl TimeframeRegistry {
    /// The standard set used by the acquisition layer: 5m, 15m, 1h, 4h, 1d.
    pub fn standard() -> Self {
        Self::from_entries(&[
            ("5m", 5 * MS_PER_MINUTE),
            ("15m", 15 * MS_PER_MINUTE),
            ("1h", MS_PER_HOUR),
            ("4h", 4 * MS_PER_HOUR),
            ("1d", MS_PER_DAY),
        ])
    }

    pub fn from_entries(entries: &[(&str, i64)]) -> Self {
        let durations = entries
            .iter()
            .map(|(name, ms)| (name.to_string(), *ms))
            .collect();
        Self { durations }
    }

    /// Duration in milliseconds for a registered timeframe name.
    pub fn duration_ms(&self, name: &str) -> Result<i64, EngineError> {
        self.durations
            .get(name)
            .copied()
            .ok_or_else(|| EngineError::UnknownTimeframe(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.durations.contains_key(name)
    }
}

impl Default for TimeframeRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
