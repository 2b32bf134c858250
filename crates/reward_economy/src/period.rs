//! # Period Calculator
//!
//! Maps a cadence, its anchor and the current instant to the quota window
//! `[start, end)` that is active right now. Pure: no state, no clock.
//!
//! ## Cadences
//!
//! | Cadence            | Window                                                   |
//! |--------------------|----------------------------------------------------------|
//! | `Hourly(n)`        | epoch-aligned blocks of `n` hours                        |
//! | `Daily(n)`         | from today's anchor time, `n` days long                  |
//! | `Weekly(n, wd)`    | from the latest weekday `wd` at anchor time, `n` weeks   |
//! | `Monthly(n, day)`  | from `day` of this month (clamped), `n` months           |
//! | `Custom(d)`        | epoch-aligned blocks of `d`, or rolling `[now, now + d)` |
//!
//! Calendar cadences are evaluated in the configured UTC offset; windows are
//! always returned in UTC.

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc,
};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, RewardError, RewardResult};
use crate::quota::QuotaRecord;

/// Largest multiplier accepted in a cadence or duration string.
const MAX_CADENCE_MULTIPLIER: u32 = 100_000;

/// Seconds in one hour.
const SECS_PER_HOUR: i64 = 3_600;

/// A wall-clock time of day used as the rollover moment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    /// Midnight.
    pub const MIDNIGHT: Self = Self { hour: 0, minute: 0 };

    /// Creates a time of day.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` when the hour or minute is out of range.
    pub fn new(hour: u8, minute: u8) -> Result<Self, ConfigError> {
        if hour > 23 || minute > 59 {
            return Err(ConfigError::Invalid(format!(
                "invalid time of day {hour:02}:{minute:02}"
            )));
        }
        Ok(Self { hour, minute })
    }

    /// Parses `HH:MM`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` for anything else.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::Invalid(format!("invalid time of day: {text:?}"));
        let (hour, minute) = text.trim().split_once(':').ok_or_else(invalid)?;
        let hour = hour.parse::<u8>().map_err(|_| invalid())?;
        let minute = minute.parse::<u8>().map_err(|_| invalid())?;
        Self::new(hour, minute)
    }

    /// Hour component.
    #[must_use]
    pub const fn hour(self) -> u8 {
        self.hour
    }

    /// Minute component.
    #[must_use]
    pub const fn minute(self) -> u8 {
        self.minute
    }

    fn to_naive(self) -> NaiveTime {
        // Range is checked on construction.
        NaiveTime::from_hms_opt(u32::from(self.hour), u32::from(self.minute), 0)
            .unwrap_or_default()
    }
}

/// The recurrence rule of a quota.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cadence {
    /// Every `n` hours, aligned to the Unix epoch.
    Hourly(u32),
    /// Every `n` days from the anchor time.
    Daily(u32),
    /// Every `weeks` weeks from `weekday` (1 = Monday .. 7 = Sunday).
    Weekly {
        /// Window length in weeks.
        weeks: u32,
        /// Anchor weekday, 1 = Monday .. 7 = Sunday.
        weekday: u8,
    },
    /// Every `months` months from `day` of the month.
    Monthly {
        /// Window length in months.
        months: u32,
        /// Anchor day of month, clamped to the month's last day.
        day: u8,
    },
    /// A fixed duration.
    Custom(Duration),
}

impl Cadence {
    /// Parses a cadence string: `<n>h`, `<n>d`, `<n>w`, `<n>m` (months),
    /// `<n>y`, `<n>s` or `<n>min`.
    ///
    /// Weekly cadences default to Monday and monthly ones to the 1st; years,
    /// seconds and minutes become [`Cadence::Custom`].
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` for unknown units or a zero multiplier.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let (n, unit) = split_count_unit(text)?;
        let cadence = match unit {
            "h" => Self::Hourly(n),
            "d" => Self::Daily(n),
            "w" => Self::Weekly { weeks: n, weekday: 1 },
            "m" => Self::Monthly { months: n, day: 1 },
            "y" => Self::Custom(Duration::days(365 * i64::from(n))),
            "s" => Self::Custom(Duration::seconds(i64::from(n))),
            "min" => Self::Custom(Duration::minutes(i64::from(n))),
            other => {
                return Err(ConfigError::Invalid(format!(
                    "unsupported cadence unit {other:?} in {text:?}"
                )))
            }
        };
        Ok(cadence)
    }

    /// Returns true when the ledger opens windows at the moment of use
    /// instead of on a fixed grid.
    #[must_use]
    pub const fn is_rolling(&self) -> bool {
        matches!(self, Self::Custom(_))
    }
}

/// A cadence together with its optional rollover time of day.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CadenceSpec {
    /// Recurrence rule.
    pub cadence: Cadence,
    /// Rollover time of day; midnight when absent.
    pub anchor: Option<TimeOfDay>,
}

impl CadenceSpec {
    /// Anchors `cadence` at midnight.
    #[must_use]
    pub const fn new(cadence: Cadence) -> Self {
        Self {
            cadence,
            anchor: None,
        }
    }

    /// Sets the rollover time of day.
    #[must_use]
    pub const fn anchored_at(mut self, anchor: TimeOfDay) -> Self {
        self.anchor = Some(anchor);
        self
    }

    /// Builds a cadence from its configuration parts.
    ///
    /// `weekday` only applies to weekly cadences and `day` only to monthly
    /// ones; both fall back to the cadence default when absent.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` for malformed parts.
    pub fn from_parts(
        cadence: &str,
        anchor_time: Option<&str>,
        weekday: Option<u8>,
        day: Option<u8>,
    ) -> Result<Self, ConfigError> {
        let mut parsed = Cadence::parse(cadence)?;
        match &mut parsed {
            Cadence::Weekly { weekday: wd, .. } => {
                if let Some(requested) = weekday {
                    if !(1..=7).contains(&requested) {
                        return Err(ConfigError::Invalid(format!(
                            "anchor weekday must be 1-7, got {requested}"
                        )));
                    }
                    *wd = requested;
                }
            }
            Cadence::Monthly { day: d, .. } => {
                if let Some(requested) = day {
                    if !(1..=31).contains(&requested) {
                        return Err(ConfigError::Invalid(format!(
                            "anchor day must be 1-31, got {requested}"
                        )));
                    }
                    *d = requested;
                }
            }
            _ => {}
        }
        let anchor = anchor_time.map(TimeOfDay::parse).transpose()?;
        Ok(Self {
            cadence: parsed,
            anchor,
        })
    }
}

/// A half-open interval `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Window {
    /// Inclusive start.
    pub start: DateTime<Utc>,
    /// Exclusive end.
    pub end: DateTime<Utc>,
}

impl Window {
    /// Returns true when `now` lies inside the window.
    #[must_use]
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        self.start <= now && now < self.end
    }
}

/// Computes quota windows in a fixed UTC offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PeriodCalculator {
    offset: FixedOffset,
}

impl Default for PeriodCalculator {
    fn default() -> Self {
        Self::utc()
    }
}

impl PeriodCalculator {
    /// Calendar cadences evaluated in UTC.
    #[must_use]
    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    /// Calendar cadences evaluated at `minutes` east of UTC.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` when the offset is a day or more.
    pub fn with_offset_minutes(minutes: i32) -> Result<Self, ConfigError> {
        let offset = minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| ConfigError::Invalid(format!("invalid utc offset: {minutes} minutes")))?;
        Ok(Self { offset })
    }

    /// The offset calendar cadences are evaluated in.
    #[must_use]
    pub const fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// The local calendar date of `now`.
    #[must_use]
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.offset).date_naive()
    }

    /// Returns the window active at `now`.
    ///
    /// [`Cadence::Custom`] uses the epoch-aligned grid here; see
    /// [`PeriodCalculator::rolling_window`] for the variant the ledger opens.
    ///
    /// # Errors
    ///
    /// Returns `RewardError::ArithmeticOverflow` if the window falls outside
    /// the representable calendar.
    pub fn compute_window(&self, spec: &CadenceSpec, now: DateTime<Utc>) -> RewardResult<Window> {
        let anchor_time = spec.anchor.unwrap_or(TimeOfDay::MIDNIGHT).to_naive();
        let local = now.with_timezone(&self.offset);
        let today = local.date_naive();

        match spec.cadence {
            Cadence::Hourly(n) => epoch_aligned(now, i64::from(n.max(1)) * SECS_PER_HOUR),
            Cadence::Custom(span) => epoch_aligned(now, span.num_seconds().max(1)),
            Cadence::Daily(n) => {
                let anchor = self.at(today, anchor_time)?;
                split_around(now, anchor, Duration::days(i64::from(n.max(1))))
            }
            Cadence::Weekly { weeks, weekday } => {
                let current = local.weekday().number_from_monday();
                let days_back = (current + 7 - u32::from(weekday.clamp(1, 7))) % 7;
                let anchor_date = today
                    .checked_sub_signed(Duration::days(i64::from(days_back)))
                    .ok_or(RewardError::ArithmeticOverflow)?;
                let anchor = self.at(anchor_date, anchor_time)?;
                split_around(now, anchor, Duration::weeks(i64::from(weeks.max(1))))
            }
            Cadence::Monthly { months, day } => {
                let months = i64::from(months.max(1));
                let anchor_date = clamped_date(today.year(), today.month(), 0, day)?;
                let anchor = self.at(anchor_date, anchor_time)?;
                if now < anchor {
                    let start_date = clamped_date(today.year(), today.month(), -months, day)?;
                    Ok(Window {
                        start: self.at(start_date, anchor_time)?,
                        end: anchor,
                    })
                } else {
                    let end_date = clamped_date(today.year(), today.month(), months, day)?;
                    Ok(Window {
                        start: anchor,
                        end: self.at(end_date, anchor_time)?,
                    })
                }
            }
        }
    }

    /// Returns the rolling window `[now, now + span)`.
    ///
    /// # Errors
    ///
    /// Returns `RewardError::ArithmeticOverflow` if the end is not representable.
    pub fn rolling_window(&self, span: Duration, now: DateTime<Utc>) -> RewardResult<Window> {
        let end = now
            .checked_add_signed(span)
            .ok_or(RewardError::ArithmeticOverflow)?;
        Ok(Window { start: now, end })
    }

    fn at(&self, date: NaiveDate, time: NaiveTime) -> RewardResult<DateTime<Utc>> {
        self.offset
            .from_local_datetime(&date.and_time(time))
            .single()
            .map(|local| local.with_timezone(&Utc))
            .ok_or(RewardError::ArithmeticOverflow)
    }
}

/// Optional opening and closing instants of a pool or activity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveWindow {
    /// First instant requests are accepted.
    pub start: Option<DateTime<Utc>>,
    /// First instant requests are refused again.
    pub end: Option<DateTime<Utc>>,
}

impl ActiveWindow {
    /// Open at all times.
    pub const ALWAYS: Self = Self {
        start: None,
        end: None,
    };

    /// Checks that `now` lies inside the window.
    ///
    /// # Errors
    ///
    /// `RewardError::NotYetActive` before `start`, `RewardError::Expired`
    /// from `end` on.
    pub fn check(&self, now: DateTime<Utc>) -> RewardResult<()> {
        if let Some(starts_at) = self.start {
            if now < starts_at {
                return Err(RewardError::NotYetActive { starts_at });
            }
        }
        if let Some(ended_at) = self.end {
            if now >= ended_at {
                return Err(RewardError::Expired { ended_at });
            }
        }
        Ok(())
    }
}

/// Returns true when `record` does not describe `window`.
#[must_use]
pub fn is_stale(record: &QuotaRecord, window: &Window) -> bool {
    record.period_start != Some(window.start) || record.period_end != Some(window.end)
}

/// Parses a span such as `30d`, `12h`, `2w`, `1m` (30 days), `1y` (365 days),
/// `90s` or `15min`.
///
/// # Errors
///
/// Returns `ConfigError::Invalid` for unknown units or a zero multiplier.
pub fn parse_span(text: &str) -> Result<Duration, ConfigError> {
    let (n, unit) = split_count_unit(text)?;
    let n = i64::from(n);
    match unit {
        "s" => Ok(Duration::seconds(n)),
        "min" => Ok(Duration::minutes(n)),
        "h" => Ok(Duration::hours(n)),
        "d" => Ok(Duration::days(n)),
        "w" => Ok(Duration::weeks(n)),
        "m" => Ok(Duration::days(30 * n)),
        "y" => Ok(Duration::days(365 * n)),
        other => Err(ConfigError::Invalid(format!(
            "unsupported duration unit {other:?} in {text:?}"
        ))),
    }
}

fn split_count_unit(text: &str) -> Result<(u32, &str), ConfigError> {
    let text = text.trim();
    let digits = text.bytes().take_while(u8::is_ascii_digit).count();
    let (count, unit) = text.split_at(digits);
    let count = count
        .parse::<u32>()
        .map_err(|_| ConfigError::Invalid(format!("missing count in {text:?}")))?;
    if count == 0 || count > MAX_CADENCE_MULTIPLIER {
        return Err(ConfigError::Invalid(format!(
            "count in {text:?} must be between 1 and {MAX_CADENCE_MULTIPLIER}"
        )));
    }
    Ok((count, unit))
}

fn epoch_aligned(now: DateTime<Utc>, span_secs: i64) -> RewardResult<Window> {
    let ts = now.timestamp();
    let start_ts = ts - ts.rem_euclid(span_secs);
    let start = DateTime::<Utc>::from_timestamp(start_ts, 0).ok_or(RewardError::ArithmeticOverflow)?;
    let end = start
        .checked_add_signed(Duration::seconds(span_secs))
        .ok_or(RewardError::ArithmeticOverflow)?;
    Ok(Window { start, end })
}

/// `[anchor - span, anchor)` before the anchor, `[anchor, anchor + span)` from it on.
fn split_around(now: DateTime<Utc>, anchor: DateTime<Utc>, span: Duration) -> RewardResult<Window> {
    if now < anchor {
        let start = anchor
            .checked_sub_signed(span)
            .ok_or(RewardError::ArithmeticOverflow)?;
        Ok(Window { start, end: anchor })
    } else {
        let end = anchor
            .checked_add_signed(span)
            .ok_or(RewardError::ArithmeticOverflow)?;
        Ok(Window { start: anchor, end })
    }
}

/// `day` of the month `delta_months` away from `year`/`month`, clamped to
/// that month's last day.
fn clamped_date(year: i32, month: u32, delta_months: i64, day: u8) -> RewardResult<NaiveDate> {
    let index = i64::from(year) * 12 + i64::from(month) - 1 + delta_months;
    let target_year = i32::try_from(index.div_euclid(12)).map_err(|_| RewardError::ArithmeticOverflow)?;
    // rem_euclid(12) is in 0..12
    let target_month = u32::try_from(index.rem_euclid(12) + 1).map_err(|_| RewardError::ArithmeticOverflow)?;
    let last = last_day_of_month(target_year, target_month)?;
    let day = u32::from(day.max(1)).min(last);
    NaiveDate::from_ymd_opt(target_year, target_month, day).ok_or(RewardError::ArithmeticOverflow)
}

fn last_day_of_month(year: i32, month: u32) -> RewardResult<u32> {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .ok_or(RewardError::ArithmeticOverflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn window(start: DateTime<Utc>, end: DateTime<Utc>) -> Window {
        Window { start, end }
    }

    #[test]
    fn test_hourly_is_epoch_aligned() {
        let calc = PeriodCalculator::utc();
        let spec = CadenceSpec::new(Cadence::Hourly(2));
        let w = calc.compute_window(&spec, at(2024, 3, 1, 13, 45)).unwrap();
        assert_eq!(w, window(at(2024, 3, 1, 12, 0), at(2024, 3, 1, 14, 0)));
    }

    #[test]
    fn test_daily_before_and_after_anchor() {
        let calc = PeriodCalculator::utc();
        let spec = CadenceSpec::new(Cadence::Daily(1)).anchored_at(TimeOfDay::new(4, 0).unwrap());

        let before = calc.compute_window(&spec, at(2024, 3, 1, 3, 59)).unwrap();
        assert_eq!(before, window(at(2024, 2, 29, 4, 0), at(2024, 3, 1, 4, 0)));

        let after = calc.compute_window(&spec, at(2024, 3, 1, 4, 0)).unwrap();
        assert_eq!(after, window(at(2024, 3, 1, 4, 0), at(2024, 3, 2, 4, 0)));
    }

    #[test]
    fn test_daily_multi_day_length() {
        let calc = PeriodCalculator::utc();
        let spec = CadenceSpec::new(Cadence::Daily(3));
        let w = calc.compute_window(&spec, at(2024, 3, 1, 10, 0)).unwrap();
        assert_eq!(w, window(at(2024, 3, 1, 0, 0), at(2024, 3, 4, 0, 0)));
    }

    #[test]
    fn test_daily_respects_offset() {
        // UTC+8: 23:30 local on March 1st
        let calc = PeriodCalculator::with_offset_minutes(480).unwrap();
        let spec = CadenceSpec::new(Cadence::Daily(1));
        let w = calc.compute_window(&spec, at(2024, 3, 1, 15, 30)).unwrap();
        assert_eq!(w, window(at(2024, 2, 29, 16, 0), at(2024, 3, 1, 16, 0)));
    }

    #[test]
    fn test_weekly_walks_back_to_anchor_weekday() {
        let calc = PeriodCalculator::utc();
        let spec = CadenceSpec::new(Cadence::Weekly { weeks: 1, weekday: 1 });
        // Wednesday
        let w = calc.compute_window(&spec, at(2024, 3, 6, 10, 0)).unwrap();
        assert_eq!(w, window(at(2024, 3, 4, 0, 0), at(2024, 3, 11, 0, 0)));
    }

    #[test]
    fn test_weekly_before_anchor_time_on_anchor_day() {
        let calc = PeriodCalculator::utc();
        let spec = CadenceSpec::new(Cadence::Weekly { weeks: 1, weekday: 1 })
            .anchored_at(TimeOfDay::new(5, 0).unwrap());
        // Monday 03:00, before the 05:00 rollover
        let w = calc.compute_window(&spec, at(2024, 3, 4, 3, 0)).unwrap();
        assert_eq!(w, window(at(2024, 2, 26, 5, 0), at(2024, 3, 4, 5, 0)));
    }

    #[test]
    fn test_weekly_sunday_anchor() {
        let calc = PeriodCalculator::utc();
        let spec = CadenceSpec::new(Cadence::Weekly { weeks: 1, weekday: 7 });
        // Saturday March 9th: latest Sunday is March 3rd
        let w = calc.compute_window(&spec, at(2024, 3, 9, 23, 0)).unwrap();
        assert_eq!(w, window(at(2024, 3, 3, 0, 0), at(2024, 3, 10, 0, 0)));
    }

    #[test]
    fn test_monthly_clamps_to_last_day() {
        let calc = PeriodCalculator::utc();
        let spec = CadenceSpec::new(Cadence::Monthly { months: 1, day: 31 });

        let before = calc.compute_window(&spec, at(2024, 2, 15, 0, 0)).unwrap();
        assert_eq!(before, window(at(2024, 1, 31, 0, 0), at(2024, 2, 29, 0, 0)));

        let after = calc.compute_window(&spec, at(2024, 2, 29, 12, 0)).unwrap();
        assert_eq!(after, window(at(2024, 2, 29, 0, 0), at(2024, 3, 31, 0, 0)));
    }

    #[test]
    fn test_monthly_crosses_year_boundary() {
        let calc = PeriodCalculator::utc();
        let spec = CadenceSpec::new(Cadence::Monthly { months: 1, day: 15 })
            .anchored_at(TimeOfDay::new(6, 30).unwrap());
        let w = calc.compute_window(&spec, at(2024, 1, 10, 0, 0)).unwrap();
        assert_eq!(w, window(at(2023, 12, 15, 6, 30), at(2024, 1, 15, 6, 30)));
    }

    #[test]
    fn test_custom_epoch_floor_and_rolling() {
        let calc = PeriodCalculator::utc();
        let span = Duration::minutes(90);
        let spec = CadenceSpec::new(Cadence::Custom(span));
        let now = at(2024, 3, 1, 0, 10);

        let grid = calc.compute_window(&spec, now).unwrap();
        assert_eq!(grid, window(at(2024, 3, 1, 0, 0), at(2024, 3, 1, 1, 30)));

        let rolling = calc.rolling_window(span, now).unwrap();
        assert_eq!(rolling, window(now, at(2024, 3, 1, 1, 40)));
    }

    #[test]
    fn test_window_is_deterministic() {
        let calc = PeriodCalculator::utc();
        let spec = CadenceSpec::new(Cadence::Weekly { weeks: 2, weekday: 3 });
        let now = at(2024, 5, 17, 8, 0);
        assert_eq!(
            calc.compute_window(&spec, now).unwrap(),
            calc.compute_window(&spec, now).unwrap()
        );
    }

    #[test]
    fn test_is_stale() {
        let w = window(at(2024, 3, 1, 0, 0), at(2024, 3, 2, 0, 0));
        let fresh = QuotaRecord::default();
        assert!(is_stale(&fresh, &w));

        let current = QuotaRecord {
            period_start: Some(w.start),
            period_end: Some(w.end),
            used_count: 2,
            last_refresh: Some(w.start),
        };
        assert!(!is_stale(&current, &w));

        let moved = window(w.start, at(2024, 3, 3, 0, 0));
        assert!(is_stale(&current, &moved));
    }

    #[test]
    fn test_parse_cadence_strings() {
        assert_eq!(Cadence::parse("6h").unwrap(), Cadence::Hourly(6));
        assert_eq!(Cadence::parse("1d").unwrap(), Cadence::Daily(1));
        assert_eq!(
            Cadence::parse("2w").unwrap(),
            Cadence::Weekly { weeks: 2, weekday: 1 }
        );
        assert_eq!(
            Cadence::parse("1m").unwrap(),
            Cadence::Monthly { months: 1, day: 1 }
        );
        assert_eq!(
            Cadence::parse("45min").unwrap(),
            Cadence::Custom(Duration::minutes(45))
        );
        assert!(Cadence::parse("0d").is_err());
        assert!(Cadence::parse("d").is_err());
        assert!(Cadence::parse("3q").is_err());
    }

    #[test]
    fn test_spec_from_parts() {
        let spec = CadenceSpec::from_parts("1w", Some("05:30"), Some(5), None).unwrap();
        assert_eq!(spec.cadence, Cadence::Weekly { weeks: 1, weekday: 5 });
        assert_eq!(spec.anchor, Some(TimeOfDay::new(5, 30).unwrap()));

        assert!(CadenceSpec::from_parts("1w", None, Some(8), None).is_err());
        assert!(CadenceSpec::from_parts("1m", None, None, Some(0)).is_err());
        assert!(CadenceSpec::from_parts("1d", Some("24:00"), None, None).is_err());
    }

    #[test]
    fn test_parse_span() {
        assert_eq!(parse_span("30d").unwrap(), Duration::days(30));
        assert_eq!(parse_span("1m").unwrap(), Duration::days(30));
        assert_eq!(parse_span("12h").unwrap(), Duration::hours(12));
        assert!(parse_span("12x").is_err());
    }

    #[test]
    fn test_active_window() {
        let active = ActiveWindow {
            start: Some(at(2024, 3, 1, 0, 0)),
            end: Some(at(2024, 3, 8, 0, 0)),
        };
        assert_eq!(
            active.check(at(2024, 2, 29, 23, 59)),
            Err(RewardError::NotYetActive {
                starts_at: at(2024, 3, 1, 0, 0)
            })
        );
        assert!(active.check(at(2024, 3, 1, 0, 0)).is_ok());
        assert_eq!(
            active.check(at(2024, 3, 8, 0, 0)),
            Err(RewardError::Expired {
                ended_at: at(2024, 3, 8, 0, 0)
            })
        );
        assert!(ActiveWindow::ALWAYS.check(at(1999, 1, 1, 0, 0)).is_ok());
    }
}
