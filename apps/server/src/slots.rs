use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};

/// Canonical slot-label format: zero-padded 12-hour clock with uppercase
/// meridiem, e.g. "09:00 AM". Labels elsewhere in the system are compared by
/// exact string equality, so everything funnels through this format.
const SLOT_FORMAT: &str = "%I:%M %p";

/// Parse a 12-hour wall-clock string, tolerating case and spacing variance
/// ("9:00 am", " 09:00PM "). Returns None for anything without a valid
/// hour:minute + meridiem shape.
pub fn parse_time_label(s: &str) -> Option<NaiveTime> {
    let compact = s.trim().to_uppercase().replace(' ', "");
    let (digits, meridiem) = compact
        .strip_suffix("AM")
        .map(|rest| (rest, "AM"))
        .or_else(|| compact.strip_suffix("PM").map(|rest| (rest, "PM")))?;
    NaiveTime::parse_from_str(&format!("{} {}", digits, meridiem), SLOT_FORMAT).ok()
}

pub fn format_slot(t: NaiveTime) -> String {
    t.format(SLOT_FORMAT).to_string()
}

/// Normalize an arbitrary slot label to canonical form, if it parses.
pub fn normalize_slot(s: &str) -> Option<String> {
    parse_time_label(s).map(format_slot)
}

/// Generate hourly slot labels from an open time to a close time.
///
/// Slots start at the open time and step by one hour while strictly before
/// the close time. An unparsable input or an open time at-or-after the close
/// time yields an empty list rather than an error: callers treat "no slots"
/// as a legitimate outcome of malformed configuration.
pub fn generate_slots(start: &str, end: &str) -> Vec<String> {
    let mut slots = Vec::new();

    let (open, close) = match (parse_time_label(start), parse_time_label(end)) {
        (Some(open), Some(close)) => (open, close),
        _ => return slots,
    };
    if open >= close {
        return slots;
    }

    let mut current = open;
    while current < close {
        slots.push(format_slot(current));
        let (next, wrapped) = current.overflowing_add_signed(Duration::hours(1));
        if wrapped != 0 {
            // Crossed midnight; a wall-clock close time can never be reached now.
            break;
        }
        current = next;
    }

    slots
}

/// The instant a booking's slot begins, from its stored date and label.
pub fn slot_start(date: NaiveDate, time_slot: &str) -> Option<NaiveDateTime> {
    parse_time_label(time_slot).map(|t| date.and_time(t))
}

fn day_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Full weekday name for a date, matching the recurring-availability key.
pub fn weekday_name(date: NaiveDate) -> &'static str {
    day_name(date.weekday())
}

/// Accepts a weekday in any case (full name or 3-letter abbreviation) and
/// returns the canonical full name stored in recurring records.
pub fn canonical_day_of_week(s: &str) -> Option<&'static str> {
    s.trim().parse::<Weekday>().ok().map(day_name)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    // ── parse_time_label / normalize_slot ──

    #[test]
    fn test_parse_padded() {
        assert_eq!(
            parse_time_label("09:00 AM"),
            NaiveTime::from_hms_opt(9, 0, 0)
        );
    }

    #[test]
    fn test_parse_unpadded_hour() {
        assert_eq!(
            parse_time_label("9:00 AM"),
            NaiveTime::from_hms_opt(9, 0, 0)
        );
    }

    #[test]
    fn test_parse_lowercase_meridiem() {
        assert_eq!(
            parse_time_label("9:00 pm"),
            NaiveTime::from_hms_opt(21, 0, 0)
        );
    }

    #[test]
    fn test_parse_no_space_before_meridiem() {
        assert_eq!(
            parse_time_label("9:00AM"),
            NaiveTime::from_hms_opt(9, 0, 0)
        );
    }

    #[test]
    fn test_parse_surrounding_whitespace() {
        assert_eq!(
            parse_time_label("  09:30 PM  "),
            NaiveTime::from_hms_opt(21, 30, 0)
        );
    }

    #[test]
    fn test_parse_noon_and_midnight() {
        assert_eq!(
            parse_time_label("12:00 PM"),
            NaiveTime::from_hms_opt(12, 0, 0)
        );
        assert_eq!(
            parse_time_label("12:00 AM"),
            NaiveTime::from_hms_opt(0, 0, 0)
        );
    }

    #[test]
    fn test_parse_missing_meridiem() {
        assert_eq!(parse_time_label("14:00"), None);
    }

    #[test]
    fn test_parse_garbage() {
        assert_eq!(parse_time_label("not a time"), None);
        assert_eq!(parse_time_label(""), None);
        assert_eq!(parse_time_label("25:00 AM"), None);
    }

    #[test]
    fn test_normalize_variants_agree() {
        for variant in ["09:00 AM", "9:00 am", "9:00AM", " 09:00   AM "] {
            assert_eq!(normalize_slot(variant).as_deref(), Some("09:00 AM"));
        }
    }

    #[test]
    fn test_normalize_garbage_is_none() {
        assert_eq!(normalize_slot("whenever"), None);
    }

    // ── generate_slots ──

    #[test]
    fn test_generate_morning_block() {
        assert_eq!(
            generate_slots("09:00 AM", "01:00 PM"),
            vec!["09:00 AM", "10:00 AM", "11:00 AM", "12:00 PM"]
        );
    }

    #[test]
    fn test_generate_single_hour() {
        assert_eq!(generate_slots("09:00 AM", "10:00 AM"), vec!["09:00 AM"]);
    }

    #[test]
    fn test_generate_last_slot_strictly_before_close() {
        let slots = generate_slots("06:00 PM", "09:30 PM");
        assert_eq!(slots, vec!["06:00 PM", "07:00 PM", "08:00 PM"]);
    }

    #[test]
    fn test_generate_equal_times_empty() {
        assert!(generate_slots("09:00 AM", "09:00 AM").is_empty());
    }

    #[test]
    fn test_generate_inverted_range_empty() {
        assert!(generate_slots("05:00 PM", "09:00 AM").is_empty());
    }

    #[test]
    fn test_generate_unparsable_open_empty() {
        assert!(generate_slots("garbage", "05:00 PM").is_empty());
    }

    #[test]
    fn test_generate_unparsable_close_empty() {
        assert!(generate_slots("09:00 AM", "closing time").is_empty());
    }

    #[test]
    fn test_generate_tolerates_messy_input() {
        assert_eq!(
            generate_slots("9:00am", " 11:00 AM"),
            vec!["09:00 AM", "10:00 AM"]
        );
    }

    #[test]
    fn test_generate_late_close_does_not_wrap() {
        // Stepping past 11 PM would wrap to 12 AM; the walk must stop instead
        // of looping forever under the close time.
        let slots = generate_slots("10:00 PM", "11:30 PM");
        assert_eq!(slots, vec!["10:00 PM", "11:00 PM"]);
    }

    #[test]
    fn test_generate_deterministic() {
        let a = generate_slots("08:00 AM", "08:00 PM");
        let b = generate_slots("08:00 AM", "08:00 PM");
        assert_eq!(a, b);
        assert_eq!(a.len(), 12);
    }

    #[test]
    fn test_generate_hourly_steps() {
        let slots = generate_slots("09:00 AM", "03:00 PM");
        let times: Vec<NaiveTime> = slots
            .iter()
            .map(|s| parse_time_label(s).expect("generated label parses"))
            .collect();
        for pair in times.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::hours(1));
        }
    }

    // ── slot_start / weekday helpers ──

    #[test]
    fn test_slot_start_instant() {
        let date = NaiveDate::from_ymd_opt(2030, 1, 7).unwrap();
        let start = slot_start(date, "09:00 AM").unwrap();
        assert_eq!(
            start,
            date.and_time(NaiveTime::from_hms_opt(9, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_slot_start_bad_label() {
        let date = NaiveDate::from_ymd_opt(2030, 1, 7).unwrap();
        assert_eq!(slot_start(date, "whenever"), None);
    }

    #[test]
    fn test_weekday_name() {
        // 2030-01-07 is a Monday.
        assert_eq!(
            weekday_name(NaiveDate::from_ymd_opt(2030, 1, 7).unwrap()),
            "Monday"
        );
        assert_eq!(
            weekday_name(NaiveDate::from_ymd_opt(2030, 1, 13).unwrap()),
            "Sunday"
        );
    }

    #[test]
    fn test_canonical_day_of_week() {
        assert_eq!(canonical_day_of_week("monday"), Some("Monday"));
        assert_eq!(canonical_day_of_week("SATURDAY"), Some("Saturday"));
        assert_eq!(canonical_day_of_week("wed"), Some("Wednesday"));
        assert_eq!(canonical_day_of_week("someday"), None);
    }
}
