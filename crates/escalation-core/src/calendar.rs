//! League week arithmetic.
//!
//! A league runs from local midnight of its start date to local midnight of
//! its end date. Weeks roll over at a fixed weekly cutoff (Thursday 18:00 by
//! default) in the configured timezone. Card adds are locked for a few hours
//! after each cutoff, except in the final week.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;

use escalation_types::config::CalendarConfig;
use escalation_types::error::CalendarError;
use escalation_types::league::{League, LeagueWeek};

/// Week boundaries for one league.
#[derive(Debug, Clone)]
pub struct LeagueCalendar {
    tz: Tz,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    /// Local date of the first cutoff after `start`.
    first_cutoff: NaiveDate,
    cutoff_time: NaiveTime,
    lock: Duration,
}

impl LeagueCalendar {
    pub fn new(
        start_date: NaiveDate,
        end_date: NaiveDate,
        config: &CalendarConfig,
    ) -> Result<Self, CalendarError> {
        if end_date < start_date {
            return Err(CalendarError::InvalidRange);
        }
        let tz = parse_timezone(&config.timezone)?;
        let weekday = parse_weekday(&config.cutoff_weekday)?;
        let cutoff_time = parse_cutoff_time(&config.cutoff_time)?;

        let start = local_instant(tz, start_date.and_time(NaiveTime::MIN));
        let end = local_instant(tz, end_date.and_time(NaiveTime::MIN));

        let offset = (7 + weekday.num_days_from_monday() as i64
            - start_date.weekday().num_days_from_monday() as i64)
            % 7;
        let mut first_cutoff = start_date + Duration::days(offset);
        if local_instant(tz, first_cutoff.and_time(cutoff_time)) <= start {
            first_cutoff += Duration::days(7);
        }

        Ok(Self {
            tz,
            start,
            end,
            first_cutoff,
            cutoff_time,
            lock: Duration::hours(i64::from(config.lock_hours)),
        })
    }

    pub fn for_league(league: &League, config: &CalendarConfig) -> Result<Self, CalendarError> {
        Self::new(league.start_date, league.end_date, config)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// The `k`-th cutoff after the league start, 1-based.
    pub fn cutoff(&self, k: u32) -> DateTime<Utc> {
        let date = self.first_cutoff + Duration::days(7 * i64::from(k.saturating_sub(1)));
        local_instant(self.tz, date.and_time(self.cutoff_time))
    }

    /// Number of cutoffs in `(start, t]`.
    fn cutoffs_through(&self, t: DateTime<Utc>) -> u32 {
        self.count_cutoffs(t, true)
    }

    /// Number of cutoffs in `(start, t)`.
    fn cutoffs_before(&self, t: DateTime<Utc>) -> u32 {
        self.count_cutoffs(t, false)
    }

    fn count_cutoffs(&self, t: DateTime<Utc>, inclusive: bool) -> u32 {
        let passed = |instant: DateTime<Utc>| if inclusive { instant <= t } else { instant < t };

        let first = self.cutoff(1);
        if !passed(first) {
            return 0;
        }

        // Whole weeks since the first cutoff, corrected for DST drift below.
        let mut count = ((t - first).num_days() / 7 + 1).max(1) as u32;
        while passed(self.cutoff(count + 1)) {
            count += 1;
        }
        while count > 0 && !passed(self.cutoff(count)) {
            count -= 1;
        }
        count
    }

    pub fn max_week(&self) -> u32 {
        1 + self.cutoffs_before(self.end)
    }

    /// 1-based week containing `now`, clamped to `[1, max_week]`.
    pub fn current_week(&self, now: DateTime<Utc>) -> u32 {
        (1 + self.cutoffs_through(now)).clamp(1, self.max_week())
    }

    pub fn week_start(&self, week: u32) -> DateTime<Utc> {
        if week <= 1 {
            self.start
        } else {
            self.cutoff(week.min(self.max_week()) - 1)
        }
    }

    pub fn week_end(&self, week: u32) -> DateTime<Utc> {
        if week >= self.max_week() {
            self.end
        } else {
            self.cutoff(week.max(1))
        }
    }

    pub fn week_window(&self, week: u32) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.week_start(week), self.week_end(week))
    }

    /// True within `lock_hours` of the most recent cutoff.
    ///
    /// Never locked before the league starts or during the final week.
    pub fn adds_locked(&self, now: DateTime<Utc>) -> bool {
        if now < self.start || self.current_week(now) >= self.max_week() {
            return false;
        }
        match self.cutoffs_through(now) {
            0 => false,
            k => now < self.cutoff(k) + self.lock,
        }
    }

    /// The next cutoff after `now`, if it falls before the league ends.
    pub fn next_cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let next = self.cutoff(self.cutoffs_through(now) + 1);
        (next < self.end).then_some(next)
    }

    pub fn week_info(&self, now: DateTime<Utc>) -> LeagueWeek {
        let current_week = self.current_week(now);
        let (week_start, week_end) = self.week_window(current_week);
        LeagueWeek {
            current_week,
            max_week: self.max_week(),
            adds_locked: self.adds_locked(now),
            week_start,
            week_end,
            next_cutoff: self.next_cutoff(now),
        }
    }
}

pub fn parse_timezone(name: &str) -> Result<Tz, CalendarError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| CalendarError::InvalidTimezone(name.to_string()))
}

pub fn parse_weekday(name: &str) -> Result<Weekday, CalendarError> {
    name.trim()
        .parse::<Weekday>()
        .map_err(|_| CalendarError::InvalidWeekday(name.to_string()))
}

pub fn parse_cutoff_time(value: &str) -> Result<NaiveTime, CalendarError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|_| CalendarError::InvalidCutoffTime(value.to_string()))
}

/// Check every calendar setting parses.
pub fn validate_config(config: &CalendarConfig) -> Result<(), CalendarError> {
    parse_timezone(&config.timezone)?;
    parse_weekday(&config.cutoff_weekday)?;
    parse_cutoff_time(&config.cutoff_time)?;
    Ok(())
}

/// Resolve a local wall-clock time to an instant.
///
/// Ambiguous times take the earlier instant. Times skipped by a DST jump
/// move forward to the first valid instant.
fn local_instant(tz: Tz, naive: NaiveDateTime) -> DateTime<Utc> {
    (0..=3)
        .find_map(|shift| {
            tz.from_local_datetime(&(naive + Duration::hours(shift)))
                .earliest()
        })
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    /// Friday 2025-01-03 to Friday 2025-03-28, New York.
    fn winter_league() -> LeagueCalendar {
        LeagueCalendar::new(date(2025, 1, 3), date(2025, 3, 28), &CalendarConfig::default()).unwrap()
    }

    #[test]
    fn test_max_week() {
        assert_eq!(winter_league().max_week(), 13);
    }

    #[test]
    fn test_single_day_league_has_one_week() {
        let cal =
            LeagueCalendar::new(date(2025, 1, 9), date(2025, 1, 9), &CalendarConfig::default()).unwrap();
        assert_eq!(cal.max_week(), 1);
        assert_eq!(cal.current_week(utc(2025, 1, 20, 0, 0)), 1);
    }

    #[test]
    fn test_week_rolls_at_cutoff() {
        let cal = winter_league();
        // Thursday 18:00 EST is 23:00 UTC.
        assert_eq!(cal.current_week(utc(2025, 1, 9, 22, 59)), 1);
        assert_eq!(cal.current_week(utc(2025, 1, 9, 23, 0)), 2);
        assert_eq!(cal.current_week(utc(2025, 1, 16, 23, 0)), 3);
    }

    #[test]
    fn test_before_start_is_week_one() {
        let cal = winter_league();
        assert_eq!(cal.current_week(utc(2024, 12, 1, 0, 0)), 1);
        assert!(!cal.adds_locked(utc(2024, 12, 1, 0, 0)));
    }

    #[test]
    fn test_after_end_clamps_to_max() {
        let cal = winter_league();
        assert_eq!(cal.current_week(utc(2025, 6, 1, 0, 0)), 13);
    }

    #[test]
    fn test_lock_window() {
        let cal = winter_league();
        assert!(!cal.adds_locked(utc(2025, 1, 9, 22, 59)));
        assert!(cal.adds_locked(utc(2025, 1, 9, 23, 30)));
        assert!(cal.adds_locked(utc(2025, 1, 10, 4, 59)));
        assert!(!cal.adds_locked(utc(2025, 1, 10, 5, 0)));
    }

    #[test]
    fn test_cutoff_follows_dst() {
        let cal = winter_league();
        // DST began 2025-03-09; 18:00 EDT is 22:00 UTC.
        assert_eq!(cal.current_week(utc(2025, 3, 13, 21, 59)), 10);
        assert_eq!(cal.current_week(utc(2025, 3, 13, 22, 0)), 11);
        assert!(cal.adds_locked(utc(2025, 3, 13, 22, 30)));
    }

    #[test]
    fn test_final_week_never_locked() {
        let cal = winter_league();
        let now = utc(2025, 3, 27, 22, 30);
        assert_eq!(cal.current_week(now), 13);
        assert!(!cal.adds_locked(now));
        assert_eq!(cal.next_cutoff(now), None);
    }

    #[test]
    fn test_thursday_start_counts_same_day_cutoff() {
        let cal =
            LeagueCalendar::new(date(2025, 1, 2), date(2025, 3, 27), &CalendarConfig::default()).unwrap();
        assert_eq!(cal.current_week(utc(2025, 1, 2, 22, 0)), 1);
        assert_eq!(cal.current_week(utc(2025, 1, 2, 23, 0)), 2);
    }

    #[test]
    fn test_other_timezone() {
        let config = CalendarConfig {
            timezone: "America/Chicago".into(),
            ..CalendarConfig::default()
        };
        let cal = LeagueCalendar::new(date(2025, 1, 3), date(2025, 3, 28), &config).unwrap();
        assert_eq!(cal.cutoff(1), utc(2025, 1, 10, 0, 0));
    }

    #[test]
    fn test_week_window() {
        let cal = winter_league();
        let (start, end) = cal.week_window(1);
        assert_eq!(start, utc(2025, 1, 3, 5, 0));
        assert_eq!(end, utc(2025, 1, 9, 23, 0));
        let (start, end) = cal.week_window(13);
        assert_eq!(start, utc(2025, 3, 27, 22, 0));
        assert_eq!(end, utc(2025, 3, 28, 4, 0));
    }

    #[test]
    fn test_week_info() {
        let info = winter_league().week_info(utc(2025, 1, 10, 1, 0));
        assert_eq!(info.current_week, 2);
        assert_eq!(info.max_week, 13);
        assert!(info.adds_locked);
        assert_eq!(info.next_cutoff, Some(utc(2025, 1, 16, 23, 0)));
    }

    #[test]
    fn test_invalid_settings() {
        let bad_tz = CalendarConfig {
            timezone: "Mars/Olympus".into(),
            ..CalendarConfig::default()
        };
        assert_eq!(
            LeagueCalendar::new(date(2025, 1, 3), date(2025, 2, 3), &bad_tz).unwrap_err(),
            CalendarError::InvalidTimezone("Mars/Olympus".into())
        );
        assert_eq!(
            LeagueCalendar::new(date(2025, 2, 3), date(2025, 1, 3), &CalendarConfig::default())
                .unwrap_err(),
            CalendarError::InvalidRange
        );
        assert!(parse_weekday("thu").is_ok());
        assert!(parse_weekday("someday").is_err());
        assert!(parse_cutoff_time("25:00").is_err());
    }
}
