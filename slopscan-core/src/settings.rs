//! User settings stored alongside the cache
//!
//! Stored values are merged over the defaults field by field. Anything
//! that cannot be coerced keeps its default.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Store key holding the settings object
pub const SETTINGS_KEY: &str = "settings";

/// Default cache time-to-live (one week)
pub const DEFAULT_CACHE_TTL_HOURS: u32 = 168;

/// Shortest accepted cache time-to-live
pub const MIN_CACHE_TTL_HOURS: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub enabled: bool,
    #[serde(rename = "cacheTTLHours")]
    pub cache_ttl_hours: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_ttl_hours: DEFAULT_CACHE_TTL_HOURS,
        }
    }
}

impl Settings {
    /// Merge a stored settings object over the defaults
    pub fn merge(stored: Option<&Value>) -> Self {
        let mut settings = Self::default();
        let Some(obj) = stored.and_then(Value::as_object) else {
            return settings;
        };

        if let Some(enabled) = obj.get("enabled").and_then(coerce_bool) {
            settings.enabled = enabled;
        }
        if let Some(ttl) = obj.get("cacheTTLHours").and_then(coerce_ttl) {
            settings.cache_ttl_hours = ttl;
        }

        settings
    }

    pub fn ttl_millis(&self) -> i64 {
        i64::from(self.cache_ttl_hours) * 3_600_000
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "enabled": self.enabled,
            "cacheTTLHours": self.cache_ttl_hours,
        })
    }
}

fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|v| v != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Finite values of at least one hour, floored; everything else is rejected
fn coerce_ttl(value: &Value) -> Option<u32> {
    let raw = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !raw.is_finite() || raw < f64::from(MIN_CACHE_TTL_HOURS) {
        return None;
    }
    Some(raw.floor().min(f64::from(u32::MAX)) as u32)
}
