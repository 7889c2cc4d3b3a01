//! Gestational age arithmetic.

use chrono::NaiveDate;

/// Earliest gestational week accepted at registration.
pub const MIN_PREGNANCY_WEEK: i64 = 2;
/// Latest gestational week accepted at registration.
pub const MAX_PREGNANCY_WEEK: i64 = 42;

/// Whole weeks elapsed from the last menstrual period to `today`.
///
/// Floors towards negative infinity, so a future LMP yields a negative week.
pub fn pregnancy_week(today: NaiveDate, last_period_date: NaiveDate) -> i64 {
    (today - last_period_date).num_days().div_euclid(7)
}

/// Whether a gestational week falls in the accepted registration window.
pub fn is_registrable_week(week: i64) -> bool {
    (MIN_PREGNANCY_WEEK..=MAX_PREGNANCY_WEEK).contains(&week)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn test_whole_weeks() {
        assert_eq!(pregnancy_week(today(), today() - Duration::days(14)), 2);
        assert_eq!(pregnancy_week(today(), today() - Duration::days(20)), 2);
        assert_eq!(pregnancy_week(today(), today() - Duration::days(21)), 3);
    }

    #[test]
    fn test_future_date_is_negative() {
        assert_eq!(pregnancy_week(today(), today() + Duration::days(1)), -1);
        assert!(!is_registrable_week(pregnancy_week(
            today(),
            today() + Duration::days(30)
        )));
    }

    #[test]
    fn test_window_bounds() {
        assert!(!is_registrable_week(1));
        assert!(is_registrable_week(2));
        assert!(is_registrable_week(42));
        assert!(!is_registrable_week(43));
    }

    #[test]
    fn test_far_past_is_out_of_window() {
        let lmp = NaiveDate::from_ymd_opt(1990, 1, 1).unwrap();
        assert!(pregnancy_week(today(), lmp) > MAX_PREGNANCY_WEEK);
    }
}
