use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::utils::constants::{DEFAULT_SAFETY_MARGIN_SECS, DEFAULT_TTL_SECS};

/// Source of "now" for expiry decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to. Used by tests and dry runs.
#[derive(Debug, Clone)]
pub struct ManualClock {
    inner: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { inner: Arc::new(Mutex::new(start)) }
    }

    pub fn at_unix(secs: i64) -> Self {
        let start = Utc.timestamp_opt(secs, 0).single().unwrap_or_else(Utc::now);
        Self::new(start)
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.lock() = at;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.lock();
        *now += by;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DateTime<Utc>> {
        // a poisoned clock still holds a usable timestamp
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.lock()
    }
}

pub fn get_token_safety_margin_seconds(
    safety_margin_seconds_settings: Option<u64>,
    safety_margin_seconds_api: Option<u64>,
) -> u64 {
    // api level
    safety_margin_seconds_api
        // settings (global) level
        .or(safety_margin_seconds_settings)
        .unwrap_or(DEFAULT_SAFETY_MARGIN_SECS)
}

pub fn get_token_default_ttl_seconds(
    default_ttl_seconds_settings: Option<u64>,
    default_ttl_seconds_api: Option<u64>,
) -> u64 {
    default_ttl_seconds_api
        .or(default_ttl_seconds_settings)
        .unwrap_or(DEFAULT_TTL_SECS)
}

/// `minted_at + (ttl - safety_margin)`. The margin may exceed the ttl, in
/// which case the result lies at or before `minted_at`.
/// Saturates at the representable range for absurd issuer lifetimes.
pub fn expires_at_with_margin(minted_at: DateTime<Utc>, ttl_seconds: u64, safety_margin_seconds: u64) -> DateTime<Utc> {
    let ttl = i64::try_from(ttl_seconds).unwrap_or(i64::MAX);
    let margin = i64::try_from(safety_margin_seconds).unwrap_or(i64::MAX);
    let lifetime = ttl.saturating_sub(margin);
    Duration::try_seconds(lifetime)
        .and_then(|d| minted_at.checked_add_signed(d))
        .unwrap_or(if lifetime >= 0 { DateTime::<Utc>::MAX_UTC } else { DateTime::<Utc>::MIN_UTC })
}
