//! Batch run cadence.
//!
//! Payout runs fire on a fixed weekly cadence (Monday/Friday by default,
//! overridable via `BATCH_RUN_DAYS` / `BATCH_RUN_HOUR_UTC`). The worker
//! sleeps until the next fire time; manual triggers through the API use the
//! same entry point and ignore the cadence entirely.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc, Weekday};

/// Default cadence: Monday and Friday.
const DEFAULT_DAYS: [Weekday; 2] = [Weekday::Mon, Weekday::Fri];

/// Default fire hour: 16:00 UTC.
const DEFAULT_HOUR_UTC: u32 = 16;

/// Weekly payout batch cadence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchCadence {
    /// Weekdays on which a run fires.
    pub days: Vec<Weekday>,
    /// UTC hour (0-23) of the fire time.
    pub hour_utc: u32,
}

impl Default for BatchCadence {
    fn default() -> Self {
        Self {
            days: DEFAULT_DAYS.to_vec(),
            hour_utc: DEFAULT_HOUR_UTC,
        }
    }
}

impl BatchCadence {
    /// Parse a cadence from its env representation, e.g. `"MON,FRI"` and `16`.
    ///
    /// Unknown day tokens are rejected rather than skipped so a typo in the
    /// deployment config fails fast instead of silently dropping a run day.
    pub fn parse(days: &str, hour_utc: u32) -> Result<Self, String> {
        if hour_utc > 23 {
            return Err(format!("hour_utc must be 0-23, got {hour_utc}"));
        }
        let mut parsed = Vec::new();
        for token in days.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let day = match token.to_ascii_uppercase().as_str() {
                "MON" => Weekday::Mon,
                "TUE" => Weekday::Tue,
                "WED" => Weekday::Wed,
                "THU" => Weekday::Thu,
                "FRI" => Weekday::Fri,
                "SAT" => Weekday::Sat,
                "SUN" => Weekday::Sun,
                other => return Err(format!("Unknown weekday token '{other}'")),
            };
            if !parsed.contains(&day) {
                parsed.push(day);
            }
        }
        if parsed.is_empty() {
            return Err("cadence must include at least one weekday".to_string());
        }
        Ok(Self {
            days: parsed,
            hour_utc,
        })
    }

    /// The next fire time strictly after `now`.
    pub fn next_fire_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        for offset in 0..=7 {
            let date = now.date_naive() + Duration::days(offset);
            if !self.days.contains(&date.weekday()) {
                continue;
            }
            let fire = Utc
                .with_ymd_and_hms(date.year(), date.month(), date.day(), self.hour_utc, 0, 0)
                .single()
                .expect("valid fire timestamp");
            if fire > now {
                return fire;
            }
        }
        unreachable!("a weekly cadence always fires within 8 days")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn default_cadence_is_mon_fri() {
        let c = BatchCadence::default();
        assert_eq!(c.days, vec![Weekday::Mon, Weekday::Fri]);
        assert_eq!(c.hour_utc, 16);
    }

    #[test]
    fn wednesday_fires_friday() {
        // 2025-06-04 is a Wednesday.
        let c = BatchCadence::default();
        let next = c.next_fire_after(at(2025, 6, 4, 12, 0));
        assert_eq!(next, at(2025, 6, 6, 16, 0));
    }

    #[test]
    fn friday_before_fire_hour_fires_same_day() {
        // 2025-06-06 is a Friday.
        let c = BatchCadence::default();
        let next = c.next_fire_after(at(2025, 6, 6, 15, 59));
        assert_eq!(next, at(2025, 6, 6, 16, 0));
    }

    #[test]
    fn friday_after_fire_hour_rolls_to_monday() {
        let c = BatchCadence::default();
        let next = c.next_fire_after(at(2025, 6, 6, 16, 0));
        assert_eq!(next, at(2025, 6, 9, 16, 0));
    }

    #[test]
    fn parse_accepts_case_insensitive_tokens() {
        let c = BatchCadence::parse("mon, Fri", 9).unwrap();
        assert_eq!(c.days, vec![Weekday::Mon, Weekday::Fri]);
        assert_eq!(c.hour_utc, 9);
    }

    #[test]
    fn parse_rejects_unknown_day() {
        assert!(BatchCadence::parse("MON,FRY", 16).is_err());
    }

    #[test]
    fn parse_rejects_empty_and_bad_hour() {
        assert!(BatchCadence::parse("", 16).is_err());
        assert!(BatchCadence::parse("MON", 24).is_err());
    }

    #[test]
    fn single_day_cadence_wraps_a_full_week() {
        let c = BatchCadence::parse("TUE", 8).unwrap();
        // 2025-06-03 is a Tuesday; just after the fire hour.
        let next = c.next_fire_after(at(2025, 6, 3, 8, 0));
        assert_eq!(next, at(2025, 6, 10, 8, 0));
    }
}
