//! Natural-language due date resolution.
//!
//! Hints are free text from the meeting ("asap", "end of week", "next
//! month"). Matching is case-insensitive and checked in a fixed order;
//! the first rule that matches wins.

use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// Business days granted when the hint is missing or not understood
pub const DEFAULT_BUSINESS_DAYS: u32 = 10;

const URGENT: &[&str] = &["asap", "urgent", "immediately", "critical", "today", "tomorrow"];
const THIS_WEEK: &[&str] = &["this week", "end of week", "end of the week", "eow"];
const NEXT_WEEK: &[&str] = &["next week"];
const TWO_WEEKS: &[&str] = &["two weeks", "2 weeks", "couple weeks"];
const NEXT_MONTH: &[&str] = &["next month", "end of month", "eom"];

/// Resolve a due date hint relative to `today`
pub fn resolve(hint: Option<&str>, today: NaiveDate) -> NaiveDate {
    let hint = match hint.map(str::trim) {
        Some(h) if !h.is_empty() => h.to_lowercase(),
        _ => return add_business_days(today, DEFAULT_BUSINESS_DAYS),
    };

    let has = |phrases: &[&str]| phrases.iter().any(|p| hint.contains(p));

    if has(URGENT) {
        add_business_days(today, 1)
    } else if has(THIS_WEEK) {
        next_friday(today)
    } else if has(NEXT_WEEK) {
        add_business_days(today, 5)
    } else if has(TWO_WEEKS) {
        add_business_days(today, 10)
    } else if has(NEXT_MONTH) {
        add_business_days(today, 15)
    } else {
        add_business_days(today, DEFAULT_BUSINESS_DAYS)
    }
}

/// Walk forward one calendar day at a time, counting only Monday–Friday
pub fn add_business_days(start: NaiveDate, days: u32) -> NaiveDate {
    let mut date = start;
    let mut counted = 0;
    while counted < days {
        date += Duration::days(1);
        if is_business_day(date) {
            counted += 1;
        }
    }
    date
}

/// The next Friday strictly after `date`
pub fn next_friday(date: NaiveDate) -> NaiveDate {
    let today = date.weekday().num_days_from_monday() as i64;
    let friday = Weekday::Fri.num_days_from_monday() as i64;
    let mut ahead = (friday - today).rem_euclid(7);
    if ahead == 0 {
        ahead = 7;
    }
    date + Duration::days(ahead)
}

pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    // 2024-01-01 is a Monday
    const MON: (i32, u32, u32) = (2024, 1, 1);

    fn monday() -> NaiveDate {
        d(MON.0, MON.1, MON.2)
    }

    #[test]
    fn test_next_week_from_monday() {
        assert_eq!(resolve(Some("next week"), monday()), d(2024, 1, 8));
    }

    #[test]
    fn test_no_hint_is_ten_business_days() {
        assert_eq!(resolve(None, monday()), d(2024, 1, 15));
        assert_eq!(resolve(Some("   "), monday()), d(2024, 1, 15));
    }

    #[test]
    fn test_urgent_is_next_business_day() {
        assert_eq!(resolve(Some("ASAP please"), monday()), d(2024, 1, 2));
        assert_eq!(resolve(Some("by tomorrow"), monday()), d(2024, 1, 2));
        // Friday rolls over the weekend
        assert_eq!(resolve(Some("today"), d(2024, 1, 5)), d(2024, 1, 8));
    }

    #[test]
    fn test_this_week_is_next_friday() {
        assert_eq!(resolve(Some("end of week"), monday()), d(2024, 1, 5));
        assert_eq!(resolve(Some("EOW"), d(2024, 1, 3)), d(2024, 1, 5));
        // Friday rolls a full week
        assert_eq!(resolve(Some("this week"), d(2024, 1, 5)), d(2024, 1, 12));
        // Saturday goes to the coming Friday
        assert_eq!(resolve(Some("this week"), d(2024, 1, 6)), d(2024, 1, 12));
    }

    #[test]
    fn test_two_weeks_and_month() {
        assert_eq!(resolve(Some("in two weeks"), monday()), d(2024, 1, 15));
        assert_eq!(resolve(Some("couple weeks"), monday()), d(2024, 1, 15));
        assert_eq!(resolve(Some("end of month"), monday()), d(2024, 1, 22));
    }

    #[test]
    fn test_unrecognized_falls_back() {
        assert_eq!(resolve(Some("whenever"), monday()), d(2024, 1, 15));
    }

    #[test]
    fn test_calendar_date_hint_uses_default() {
        assert_eq!(resolve(Some("2024-02-14"), monday()), d(2024, 1, 15));
        // A Saturday date never becomes the due date
        assert_eq!(resolve(Some("2024-01-06"), monday()), d(2024, 1, 15));
        assert_eq!(resolve(Some("2023-12-01"), monday()), d(2024, 1, 15));
    }

    #[test]
    fn test_business_days_never_land_on_weekend() {
        let mut start = d(2024, 1, 1);
        for _ in 0..14 {
            for n in 1..25 {
                assert!(is_business_day(add_business_days(start, n)));
            }
            start += Duration::days(1);
        }
    }

    #[test]
    fn test_zero_business_days_is_identity() {
        let sat = d(2024, 1, 6);
        assert_eq!(add_business_days(sat, 0), sat);
    }
}
