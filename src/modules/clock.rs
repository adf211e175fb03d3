use std::time::Duration;

use chrono::{DateTime, Local, TimeZone};

use super::{Module, ModuleContext};
use crate::{content::ContentModel, field::Field};

const FORMAT: &str = "%a %b %-d %-I:%M:%S %p";

/// Local wall-clock time, refreshed on every second boundary.
#[derive(Debug, Default)]
pub struct Clock;

impl Clock {
    pub fn new() -> Self {
        Self
    }

    pub fn format<Tz: TimeZone>(now: &DateTime<Tz>) -> String
    where
        Tz::Offset: std::fmt::Display,
    {
        now.format(FORMAT).to_string()
    }
}

/// Time left until the next whole second.
pub fn next_tick<Tz: TimeZone>(now: &DateTime<Tz>) -> Duration {
    // Leap seconds report more than a second of nanos
    let nanos_since_last_sec = now.timestamp_subsec_nanos().min(999_999_999);
    Duration::from_nanos(u64::from(1_000_000_000 - nanos_since_last_sec))
}

impl Module for Clock {
    fn name(&self) -> &'static str {
        "clock"
    }

    fn publish(&self, model: &ContentModel) {
        model.publish(Field::Clock, Self::format(&Local::now()));
    }

    fn run(self: Box<Self>, ctx: ModuleContext) -> anyhow::Result<()> {
        while ctx.cancel.sleep(next_tick(&Local::now())) {
            ctx.publish(&*self);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use super::*;

    fn at(h: u32, m: u32, s: u32, milli: u32) -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(2026, 10, 16)
            .and_then(|date| date.and_hms_milli_opt(h, m, s, milli))
            .unwrap()
            .and_utc()
    }

    #[test]
    fn formats_like_a_twelve_hour_clock() {
        assert_eq!(Clock::format(&at(9, 5, 7, 0)), "Fri Oct 16 9:05:07 AM");
        assert_eq!(Clock::format(&at(21, 30, 0, 0)), "Fri Oct 16 9:30:00 PM");
    }

    #[test]
    fn next_tick_lands_on_the_second() {
        assert_eq!(next_tick(&at(12, 0, 0, 250)), Duration::from_millis(750));
        assert_eq!(next_tick(&at(12, 0, 0, 0)), Duration::from_secs(1));
    }
}
