//! Booking lifecycle configuration.

use chrono::Duration;
use std::env;

/// Booking lifecycle tunables.
#[derive(Debug, Clone)]
pub struct BookingConfig {
    /// How long an unpaid booking holds its slot before lapsing.
    pub hold_duration: Duration,

    /// How long before the scheduled start check-in opens.
    pub check_in_lead: Duration,
}

impl BookingConfig {
    /// Create configuration from environment variables
    ///
    /// Expected environment variables:
    /// - `BOOKING_HOLD_MINUTES`: payment hold duration (default: 15)
    /// - `CHECKIN_WINDOW_MINUTES`: check-in lead before start (default: 15)
    pub fn from_env() -> Self {
        let hold_minutes = env::var("BOOKING_HOLD_MINUTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(15);

        let check_in_minutes = env::var("CHECKIN_WINDOW_MINUTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(15);

        Self {
            hold_duration: Duration::minutes(hold_minutes),
            check_in_lead: Duration::minutes(check_in_minutes),
        }
    }
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            hold_duration: Duration::minutes(15),
            check_in_lead: Duration::minutes(15),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_fifteen_minutes() {
        let config = BookingConfig::default();
        assert_eq!(config.hold_duration, Duration::minutes(15));
        assert_eq!(config.check_in_lead, Duration::minutes(15));
    }
}
