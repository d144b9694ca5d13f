//! `time` service.

use std::fmt::Display;

use chrono::{
    DateTime, Datelike, FixedOffset, Month, NaiveDateTime, Offset, TimeDelta, Timelike, Utc,
    Weekday,
};

use areaflow_app::capability::{Capability, CapabilityContext, CapabilitySpec};
use areaflow_domain::applet::AreaRef;
use areaflow_domain::execution::{CapabilityError, EventData, ExecutionResult};
use areaflow_domain::store::Store;

const DATE_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";
const INPUT_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

fn invalid(key: &str, reason: impl Display) -> CapabilityError {
    CapabilityError::InvalidSetting {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

/// Canonical name and length in seconds of a unit. Unknown units count as
/// seconds.
fn unit_seconds(unit: &str) -> (&'static str, f64) {
    match unit {
        "minute" | "minutes" => ("minute", 60.0),
        "hour" | "hours" => ("hour", 3_600.0),
        "day" | "days" => ("day", 86_400.0),
        "week" | "weeks" => ("week", 604_800.0),
        "month" | "months" => ("month", 2_592_000.0),
        "year" | "years" => ("year", 31_536_000.0),
        _ => ("second", 1.0),
    }
}

/// Fires once `req:time:duration` units of `req:time:unit` (default
/// `second`) have elapsed, then starts waiting again.
///
/// The deadline is memoised in `ctx:end:time` on the first call after
/// (re)arming.
pub struct WaitTime;

impl WaitTime {
    const DURATION: &'static str = "req:time:duration";
    const UNIT: &'static str = "req:time:unit";
    const END: &'static str = "ctx:end:time";
    const END_UNIT: &'static str = "ctx:time:unit";

    #[must_use]
    pub fn spec() -> CapabilitySpec {
        CapabilitySpec::action(AreaRef::new("time", "wait_time"))
            .rate_limit(30)
            .required(&[Self::DURATION])
    }

    /// Read the memoised deadline, computing and storing it when absent.
    fn deadline(store: &mut Store, now: DateTime<Utc>) -> Result<DateTime<Utc>, CapabilityError> {
        if let Some(end) = store.get_str(Self::END) {
            return DateTime::parse_from_rfc3339(end)
                .map(|dt| dt.to_utc())
                .map_err(|err| invalid(Self::END, err));
        }
        let amount = store
            .get_f64(Self::DURATION)
            .filter(|amount| amount.is_finite() && *amount >= 0.0)
            .ok_or_else(|| invalid(Self::DURATION, "not a positive number"))?;
        let (unit, seconds) = unit_seconds(store.get_str(Self::UNIT).unwrap_or_default());

        let out_of_range = || invalid(Self::DURATION, "deadline is out of range");
        let millis = amount * seconds * 1_000.0;
        #[allow(clippy::cast_precision_loss)]
        let limit = i64::MAX as f64;
        if millis >= limit {
            return Err(out_of_range());
        }
        #[allow(clippy::cast_possible_truncation)]
        let end = TimeDelta::try_milliseconds(millis as i64)
            .and_then(|delay| now.checked_add_signed(delay))
            .ok_or_else(out_of_range)?;

        store.set(Self::END, end.to_rfc3339());
        store.set(Self::END_UNIT, unit);
        Ok(end)
    }
}

#[async_trait::async_trait]
impl Capability for WaitTime {
    async fn evaluate(&self, ctx: CapabilityContext<'_>) -> ExecutionResult {
        let now = Utc::now();
        let end = match Self::deadline(ctx.store, now) {
            Ok(end) => end,
            Err(err) => return ExecutionResult::failed(err),
        };
        if now < end {
            return ExecutionResult::idle();
        }

        let duration = ctx.store.get(Self::DURATION).cloned().unwrap_or_default();
        let unit = ctx.store.remove(Self::END_UNIT).unwrap_or_default();
        ctx.store.remove(Self::END);
        ExecutionResult::triggered(EventData::new())
            .with("time:wait:duration", duration)
            .with("time:wait:unit", unit)
            .with("time:current:date", now.format(DATE_FORMAT).to_string())
            .with("time:target:date", end.format(DATE_FORMAT).to_string())
    }
}

/// Calendar constraints of [`EveryTime`]. Unset fields match anything.
#[derive(Debug, Clone, PartialEq)]
struct Schedule {
    year: Option<i32>,
    month: Option<Month>,
    weekday: Option<Weekday>,
    hour: Option<u32>,
    minute: Option<u32>,
    offset: FixedOffset,
}

impl Schedule {
    fn from_store(store: &Store) -> Result<Self, CapabilityError> {
        let year = Self::number(store, EveryTime::YEAR, 0, 9_999)?
            .map(|year| i32::try_from(year).map_err(|err| invalid(EveryTime::YEAR, err)))
            .transpose()?;
        let month = store
            .get_str(EveryTime::MONTH)
            .map(|month| month.trim().parse::<Month>())
            .transpose()
            .map_err(|_| invalid(EveryTime::MONTH, "not a month name"))?;
        let weekday = store
            .get_str(EveryTime::DAY)
            .map(|day| day.trim().parse::<Weekday>())
            .transpose()
            .map_err(|_| invalid(EveryTime::DAY, "not a day name"))?;
        let hour = Self::number(store, EveryTime::HOUR, 0, 23)?;
        let minute = Self::number(store, EveryTime::MINUTE, 0, 59)?;
        let offset = match store.get_str(EveryTime::ZONE) {
            Some(zone) => parse_zone(zone)
                .ok_or_else(|| invalid(EveryTime::ZONE, "expected UTC, UTC+N or UTC-N"))?,
            None => Utc.fix(),
        };
        Ok(Self {
            year,
            month,
            weekday,
            hour,
            minute,
            offset,
        })
    }

    fn number(store: &Store, key: &str, min: i64, max: i64) -> Result<Option<u32>, CapabilityError> {
        if !store.contains(key) {
            return Ok(None);
        }
        let value = store
            .get_i64(key)
            .filter(|value| (min..=max).contains(value))
            .ok_or_else(|| invalid(key, format!("expected a number between {min} and {max}")))?;
        u32::try_from(value).map(Some).map_err(|err| invalid(key, err))
    }

    fn is_empty(&self) -> bool {
        self.year.is_none()
            && self.month.is_none()
            && self.weekday.is_none()
            && self.hour.is_none()
            && self.minute.is_none()
    }

    /// Without any constraint the schedule matches midnight.
    fn matches(&self, now: &DateTime<FixedOffset>) -> bool {
        if self.is_empty() {
            return now.hour() == 0 && now.minute() == 0;
        }
        self.year.is_none_or(|year| year == now.year())
            && self
                .month
                .is_none_or(|month| month.number_from_month() == now.month())
            && self.weekday.is_none_or(|weekday| weekday == now.weekday())
            && self.hour.is_none_or(|hour| hour == now.hour())
            && self.minute.is_none_or(|minute| minute == now.minute())
    }
}

/// Parse `UTC`, `UTC+N` or `UTC-N` with `N` whole hours.
fn parse_zone(zone: &str) -> Option<FixedOffset> {
    let hours = match zone.trim().strip_prefix("UTC")? {
        "" => 0,
        rest => rest.parse::<i32>().ok()?,
    };
    if !(-12..=14).contains(&hours) {
        return None;
    }
    FixedOffset::east_opt(hours * 3_600)
}

/// Fires at every minute matching the configured year, month, day of week,
/// hour and minute in the configured zone. With nothing configured it
/// fires every day at midnight.
///
/// A matching minute fires at most once; the last one is memoised in
/// `ctx:last:fire`.
pub struct EveryTime;

impl EveryTime {
    const YEAR: &'static str = "req:year";
    const MONTH: &'static str = "req:month:of:year";
    const DAY: &'static str = "req:day:of:week";
    const HOUR: &'static str = "req:hour:of:day";
    const MINUTE: &'static str = "req:minute:of:hour";
    const ZONE: &'static str = "req:time:zone";
    const LAST: &'static str = "ctx:last:fire";

    #[must_use]
    pub fn spec() -> CapabilitySpec {
        CapabilitySpec::action(AreaRef::new("time", "every_time")).rate_limit(30)
    }

    fn fire(store: &mut Store, schedule: &Schedule, now: DateTime<FixedOffset>) -> ExecutionResult {
        if !schedule.matches(&now) {
            return ExecutionResult::idle();
        }
        let stamp = now.format("%Y-%m-%dT%H:%M").to_string();
        if store.get_str(Self::LAST) == Some(stamp.as_str()) {
            return ExecutionResult::idle();
        }
        store.set(Self::LAST, stamp);

        ExecutionResult::triggered(EventData::new())
            .with("time:current:date", now.format("%Y-%m-%d").to_string())
            .with("time:current:time", now.format("%H:%M:%S").to_string())
            .with("time:current:zone", now.format("%:z").to_string())
            .with("time:current:year", i64::from(now.year()))
            .with("time:current:month", now.format("%B").to_string())
            .with("time:current:day", now.format("%A").to_string())
            .with("time:current:hour", i64::from(now.hour()))
            .with("time:current:minute", i64::from(now.minute()))
    }
}

#[async_trait::async_trait]
impl Capability for EveryTime {
    async fn evaluate(&self, ctx: CapabilityContext<'_>) -> ExecutionResult {
        match Schedule::from_store(ctx.store) {
            Ok(schedule) => {
                let now = Utc::now().with_timezone(&schedule.offset);
                Self::fire(ctx.store, &schedule, now)
            }
            Err(err) => ExecutionResult::failed(err),
        }
    }
}

/// Logs the time elapsed between two dates in `req:diff:unit` (default
/// `second`).
pub struct CalculateTimeDifference;

struct Span {
    from: NaiveDateTime,
    to: NaiveDateTime,
    value: f64,
    unit: &'static str,
}

impl CalculateTimeDifference {
    const FROM: &'static str = "req:calculate:time:from";
    const TO: &'static str = "req:calculate:time:to";
    const UNIT: &'static str = "req:diff:unit";

    #[must_use]
    pub fn spec() -> CapabilitySpec {
        CapabilitySpec::reaction(AreaRef::new("time", "time_reaction_calculate_time"))
            .required(&[Self::FROM, Self::TO])
    }

    fn date(store: &Store, key: &str) -> Result<NaiveDateTime, CapabilityError> {
        let raw = store.require_str(key)?;
        NaiveDateTime::parse_from_str(raw.trim(), INPUT_DATE_FORMAT).map_err(|err| invalid(key, err))
    }

    fn span(store: &Store) -> Result<Span, CapabilityError> {
        let from = Self::date(store, Self::FROM)?;
        let to = Self::date(store, Self::TO)?;
        let (unit, seconds) = unit_seconds(store.get_str(Self::UNIT).unwrap_or_default());
        #[allow(clippy::cast_precision_loss)]
        let elapsed = (to - from).num_milliseconds() as f64 / 1_000.0;
        Ok(Span {
            from,
            to,
            value: elapsed / seconds,
            unit,
        })
    }
}

#[async_trait::async_trait]
impl Capability for CalculateTimeDifference {
    async fn evaluate(&self, ctx: CapabilityContext<'_>) -> ExecutionResult {
        match Self::span(ctx.store) {
            Ok(span) => {
                ctx.log.info(&format!(
                    "time between {} and {}: {} {}",
                    span.from, span.to, span.value, span.unit
                ));
                ExecutionResult::done()
            }
            Err(err) => ExecutionResult::failed(err),
        }
    }
}
