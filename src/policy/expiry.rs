//! License expiry policy.
//!
//! A license issued at `t` with `n` validity days is valid through
//! `t + n days` inclusive: at exactly that instant it is still valid, one
//! second later it is expired.

use crate::clock::Clock;
use crate::protocol::models::License;
use crate::LicvaultError;
use chrono::{DateTime, Duration, Utc};

/// Longest validity window a license may carry (100 years).
///
/// Keeps `issued_at + validity_days` inside the date range of every
/// generated validator's runtime.
pub const MAX_VALIDITY_DAYS: u32 = 36_500;

/// Last instant at which a license is valid, or `None` when it falls
/// outside the representable range.
pub fn expires_at(issued_at: DateTime<Utc>, validity_days: u32) -> Option<DateTime<Utc>> {
    issued_at.checked_add_signed(Duration::days(i64::from(validity_days)))
}

/// Check that `license` has not expired.
///
/// # Errors
/// * `LicenseExpired` - the current time is past `issued_at + validity_days`
pub fn check_expiry<C: Clock + ?Sized>(license: &License, clock: &C) -> Result<(), LicvaultError> {
    let expires_at = license.expires_at();
    if clock.now_utc() > expires_at {
        return Err(LicvaultError::LicenseExpired { expires_at });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use chrono::TimeZone;
    use serde_json::json;

    fn license_issued_at(issued_at: DateTime<Utc>, days: u32) -> License {
        License {
            id: "lic-1".to_string(),
            tenant_id: "tenant-1".to_string(),
            issued_at,
            validity_days: days,
            payload: json!({}),
            linked_subscription: None,
        }
    }

    #[test]
    fn test_expires_at_adds_whole_days() {
        let issued = Utc.with_ymd_and_hms(2024, 2, 10, 9, 15, 0).unwrap();
        // Crosses the leap day.
        assert_eq!(
            expires_at(issued, 30),
            Some(Utc.with_ymd_and_hms(2024, 3, 11, 9, 15, 0).unwrap())
        );
    }

    #[test]
    fn test_expires_at_out_of_range_is_none() {
        assert_eq!(expires_at(DateTime::<Utc>::MAX_UTC, 1), None);
        let issued = Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap();
        assert_eq!(expires_at(issued, u32::MAX), None);
        assert!(expires_at(issued, MAX_VALIDITY_DAYS).is_some());
    }

    #[test]
    fn test_fresh_license_is_valid() {
        let clock = MockClock::from_rfc3339("2025-01-15T12:00:00Z");
        let license = license_issued_at(clock.now_utc(), 30);
        assert!(check_expiry(&license, &clock).is_ok());
    }

    #[test]
    fn test_exact_boundary_is_valid() {
        let clock = MockClock::from_rfc3339("2025-01-15T12:00:00Z");
        let license = license_issued_at(clock.now_utc() - Duration::days(30), 30);
        assert!(check_expiry(&license, &clock).is_ok());
    }

    #[test]
    fn test_one_second_past_boundary_is_expired() {
        let clock = MockClock::from_rfc3339("2025-01-15T12:00:00Z");
        let issued = clock.now_utc() - Duration::days(30) - Duration::seconds(1);
        let license = license_issued_at(issued, 30);

        let result = check_expiry(&license, &clock);
        assert!(matches!(result, Err(LicvaultError::LicenseExpired { .. })));
    }

    #[test]
    fn test_expired_error_reports_instant() {
        let clock = MockClock::from_rfc3339("2025-06-01T00:00:00Z");
        let license = license_issued_at(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(), 1);

        match check_expiry(&license, &clock) {
            Err(LicvaultError::LicenseExpired { expires_at }) => {
                assert_eq!(expires_at, Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap());
            }
            other => panic!("expected LicenseExpired, got {:?}", other),
        }
    }

    #[test]
    fn test_future_issued_license_is_valid() {
        // Clock skew between issuer and client should not reject a fresh license.
        let clock = MockClock::from_rfc3339("2025-01-15T12:00:00Z");
        let license = license_issued_at(clock.now_utc() + Duration::minutes(5), 1);
        assert!(check_expiry(&license, &clock).is_ok());
    }
}
