//! Adaptive Sampling Control
//!
//! Tunes generation parameters per named profile from a rolling window
//! of observed outcomes. The tuning is stateless given the history:
//! every call recomputes from the base values, so parameters never
//! drift cumulatively across calls.
//!
//! Three profiles are built in: `adaptive`, `conservative`, and
//! `creative`. Recording an outcome against an unknown profile creates
//! it with adaptive defaults; asking for parameters of an unknown
//! profile falls back to `adaptive`.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Ring-buffer capacity per profile.
pub const HISTORY_CAPACITY: usize = 100;

/// How many recent outcomes feed the tuning decision.
const TUNING_WINDOW: usize = 20;

/// The profile every unknown name falls back to.
pub const FALLBACK_PROFILE: &str = "adaptive";

/// One observed generation outcome. Immutable once created.
#[derive(Debug, Clone, Serialize)]
pub struct SamplingStats {
    pub latency_ms: f64,
    pub token_count: u32,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

impl SamplingStats {
    pub fn new(latency_ms: f64, token_count: u32, success: bool) -> Self {
        Self {
            latency_ms,
            token_count,
            success,
            timestamp: Utc::now(),
        }
    }
}

/// Clamp bounds for tuned parameters.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ProfileBounds {
    pub min_temperature: f64,
    pub max_temperature: f64,
    pub min_top_p: f64,
    pub max_top_p: f64,
}

impl Default for ProfileBounds {
    fn default() -> Self {
        Self {
            min_temperature: 0.1,
            max_temperature: 1.2,
            min_top_p: 0.1,
            max_top_p: 1.0,
        }
    }
}

/// Tuned parameters handed to generation callers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TunedParams {
    pub temperature: f64,
    pub top_p: f64,
}

struct SamplingProfile {
    base_temperature: f64,
    base_top_p: f64,
    bounds: ProfileBounds,
    history: VecDeque<SamplingStats>,
    capacity: usize,
}

impl SamplingProfile {
    fn new(base_temperature: f64, base_top_p: f64, bounds: ProfileBounds) -> Self {
        Self {
            base_temperature,
            base_top_p,
            bounds,
            history: VecDeque::with_capacity(HISTORY_CAPACITY),
            capacity: HISTORY_CAPACITY,
        }
    }

    fn record(&mut self, stats: SamplingStats) {
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(stats);
    }

    fn tuned(&self) -> TunedParams {
        if self.history.is_empty() {
            return TunedParams {
                temperature: self.base_temperature,
                top_p: self.base_top_p,
            };
        }

        let window_start = self.history.len().saturating_sub(TUNING_WINDOW);
        let window: Vec<&SamplingStats> = self.history.iter().skip(window_start).collect();
        let n = window.len() as f64;

        let avg_latency = window.iter().map(|s| s.latency_ms).sum::<f64>() / n;
        let success_rate = window.iter().filter(|s| s.success).count() as f64 / n;

        let mut temperature = self.base_temperature;
        let mut top_p = self.base_top_p;

        // Slow responses get a cooler temperature, fast ones a warmer one.
        if avg_latency > 1000.0 {
            temperature = (self.base_temperature - 0.2).max(self.bounds.min_temperature);
        } else if avg_latency < 200.0 {
            temperature = (self.base_temperature + 0.1).min(self.bounds.max_temperature);
        }

        // Low success rates widen the nucleus, very high ones narrow it.
        if success_rate < 0.8 {
            top_p = (self.base_top_p + 0.1).min(self.bounds.max_top_p);
        } else if success_rate > 0.95 {
            top_p = (self.base_top_p - 0.05).max(self.bounds.min_top_p);
        }

        TunedParams {
            temperature: round2(temperature),
            top_p: round2(top_p),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Controller over all named sampling profiles.
pub struct SamplingController {
    profiles: Mutex<HashMap<String, SamplingProfile>>,
}

impl SamplingController {
    /// Create a controller with the three built-in profiles.
    pub fn new() -> Self {
        let mut profiles = HashMap::new();
        profiles.insert(
            "adaptive".to_string(),
            SamplingProfile::new(0.7, 0.9, ProfileBounds::default()),
        );
        profiles.insert(
            "conservative".to_string(),
            SamplingProfile::new(0.3, 0.8, ProfileBounds::default()),
        );
        profiles.insert(
            "creative".to_string(),
            SamplingProfile::new(1.0, 1.0, ProfileBounds::default()),
        );
        Self {
            profiles: Mutex::new(profiles),
        }
    }

    /// Register or replace a profile with explicit base values.
    pub fn register_profile(
        &self,
        name: impl Into<String>,
        base_temperature: f64,
        base_top_p: f64,
        bounds: ProfileBounds,
    ) {
        let name = name.into();
        tracing::debug!(profile = %name, "Registered sampling profile");
        self.lock()
            .insert(name, SamplingProfile::new(base_temperature, base_top_p, bounds));
    }

    /// Tuned parameters for a profile. Unknown names use the adaptive
    /// profile.
    pub fn params_for(&self, profile: &str) -> TunedParams {
        let profiles = self.lock();
        let profile = profiles
            .get(profile)
            .or_else(|| profiles.get(FALLBACK_PROFILE));
        match profile {
            Some(p) => p.tuned(),
            // The fallback profile is installed at construction and
            // never removed.
            None => TunedParams {
                temperature: 0.7,
                top_p: 0.9,
            },
        }
    }

    /// Append an outcome to a profile's history, creating the profile
    /// with adaptive defaults if it does not exist yet.
    pub fn record_outcome(&self, profile: &str, latency_ms: f64, token_count: u32, success: bool) {
        let mut profiles = self.lock();
        let entry = profiles.entry(profile.to_string()).or_insert_with(|| {
            tracing::debug!(profile = %profile, "Auto-created sampling profile");
            SamplingProfile::new(0.7, 0.9, ProfileBounds::default())
        });
        entry.record(SamplingStats::new(latency_ms, token_count, success));
    }

    /// History length for a profile, zero when it does not exist.
    pub fn history_len(&self, profile: &str) -> usize {
        self.lock().get(profile).map(|p| p.history.len()).unwrap_or(0)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, SamplingProfile>> {
        self.profiles.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for SamplingController {
    fn default() -> Self {
        Self::new()
    }
}
