extern crate anyhow;
extern crate chrono;
extern crate chrono_tz;
extern crate serde_json;
extern crate std;

use anyhow::Context;
use crate::result;
use crate::snapshot;

const DAYS: [&str; 7] = ["monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday"];
const MINUTES_PER_DAY: i64 = 24 * 60;
const HALF_DAY: i64 = MINUTES_PER_DAY / 2;

/// The local timetable written by the schedule builder: departure times
/// ("HH:MM", sorted) keyed by lowercase weekday name.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FallbackSchedule {
    pub station: String,
    #[serde(default)]
    pub line: Option<String>,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub generated: Option<String>,
    #[serde(default)]
    pub schedule: std::collections::BTreeMap<String, Vec<String>>,
}

#[derive(Debug, PartialEq)]
pub struct NextDeparture {
    pub departure: String,
    pub minutes_until: i64,
}

pub fn load_schedule<P: AsRef<std::path::Path>>(path: P) -> result::DashResult<FallbackSchedule> {
    return load_schedule_inner(path.as_ref())
        .map_err(|err| result::DashError::NoFallbackAvailable(err.to_string()));
}

fn load_schedule_inner(path: &std::path::Path) -> result::DashResult<FallbackSchedule> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Opening fallback schedule '{}'", path.display()))?;
    let reader = std::io::BufReader::new(file);
    let schedule: FallbackSchedule = serde_json::from_reader(reader)
        .with_context(|| format!("while parsing fallback schedule '{}'", path.display()))?;
    if schedule.station.trim().is_empty() {
        return Err(result::make_error("fallback schedule has no station"));
    }
    return Ok(schedule);
}

/// The metro part of a snapshot built from the timetable, counting down
/// from `now`.
pub fn fallback_metro(schedule: &FallbackSchedule, now: &chrono::DateTime<chrono_tz::Tz>) -> snapshot::MetroInfo {
    let next = next_departure(schedule, now);
    return snapshot::MetroInfo{
        station: schedule.station.clone(),
        next_departure: next.as_ref().map(|n| n.departure.clone()),
        minutes_until: next.map(|n| n.minutes_until),
        line_color: None,
    };
}

/// First departure strictly after `now`: later today, otherwise the first
/// one on the next day that has any service.
pub fn next_departure(schedule: &FallbackSchedule, now: &chrono::DateTime<chrono_tz::Tz>) -> Option<NextDeparture> {
    use chrono::{Datelike, Timelike};

    let now_minutes = (now.hour() * 60 + now.minute()) as i64;
    let today = now.weekday().num_days_from_monday() as usize;

    for day_offset in 0..8 {
        let day = DAYS[(today + day_offset) % DAYS.len()];
        let departures = match schedule.schedule.get(day) {
            Some(departures) => departures,
            None => continue,
        };

        let mut candidates: Vec<i64> = departures.iter()
            .filter_map(|d| parse_hhmm(d))
            .collect();
        candidates.sort();

        let found = if day_offset == 0 {
            candidates.into_iter().find(|m| *m > now_minutes)
        } else {
            candidates.into_iter().next()
        };

        if let Some(departure_minutes) = found {
            let minutes_until = day_offset as i64 * MINUTES_PER_DAY + departure_minutes - now_minutes;
            return Some(NextDeparture{
                departure: format_hhmm(departure_minutes),
                minutes_until: minutes_until,
            });
        }
    }

    return None;
}

/// Minutes from `now` until a "HH:MM" departure, taking whichever
/// occurrence of that wall-clock time is within half a day. None once the
/// departure has gone.
pub fn minutes_until(departure: &str, now: &chrono::DateTime<chrono_tz::Tz>) -> Option<i64> {
    use chrono::Timelike;

    let departure_minutes = parse_hhmm(departure)?;
    let now_minutes = (now.hour() * 60 + now.minute()) as i64;
    let mut minutes = departure_minutes - now_minutes;
    if minutes < -HALF_DAY {
        // 23:50 now, 00:05 departure.
        minutes += MINUTES_PER_DAY;
    } else if minutes > HALF_DAY {
        // 00:10 now, 23:58 departure: that was last night.
        minutes -= MINUTES_PER_DAY;
    }
    if minutes < 0 {
        return None;
    }
    return Some(minutes);
}

fn parse_hhmm(raw: &str) -> Option<i64> {
    let mut parts = raw.trim().splitn(2, ':');
    let hours = parts.next()?.parse::<i64>().ok()?;
    let minutes = parts.next()?.get(0..2)?.parse::<i64>().ok()?;
    if hours < 0 || minutes < 0 || minutes >= 60 {
        return None;
    }
    // Service past midnight is sometimes written as 24:10, 25:05, ...
    return Some((hours % 24) * 60 + minutes);
}

fn format_hhmm(minutes: i64) -> String {
    return format!("{:02}:{:02}", minutes / 60, minutes % 60);
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    fn montreal(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> chrono::DateTime<chrono_tz::Tz> {
        return chrono_tz::America::Montreal.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap();
    }

    fn schedule() -> super::FallbackSchedule {
        return super::load_schedule("testdata/schedule.json").expect("load schedule.json");
    }

    #[test]
    fn json_parse() {
        let schedule = schedule();
        assert_eq!("Rosemont", schedule.station);
        assert_eq!(Some("2".to_string()), schedule.line);
        assert!(schedule.schedule.contains_key("monday"));
    }

    #[test]
    fn next_departure_later_today() {
        // 2026-02-09 is a Monday.
        let next = super::next_departure(&schedule(), &montreal(2026, 2, 9, 15, 30));
        assert_eq!(Some(super::NextDeparture{departure: "15:38".to_string(), minutes_until: 8}), next);
    }

    #[test]
    fn departure_at_this_minute_is_skipped() {
        let next = super::next_departure(&schedule(), &montreal(2026, 2, 9, 15, 38)).expect("next");
        assert_eq!("15:46", next.departure);
    }

    #[test]
    fn next_departure_rolls_to_tomorrow() {
        // Last Monday departure is 23:55; Tuesday starts at 05:30.
        let next = super::next_departure(&schedule(), &montreal(2026, 2, 9, 23, 58)).expect("next");
        assert_eq!("05:30", next.departure);
        assert_eq!(2 + 5 * 60 + 30, next.minutes_until);
    }

    #[test]
    fn empty_schedule_has_no_departure() {
        let mut schedule = schedule();
        schedule.schedule.clear();
        assert_eq!(None, super::next_departure(&schedule, &montreal(2026, 2, 9, 12, 0)));
    }

    #[test]
    fn malformed_times_are_skipped() {
        let mut schedule = schedule();
        schedule.schedule.insert("monday".to_string(), vec!["soon".to_string(), "25:10".to_string(), "16:00".to_string()]);
        let next = super::next_departure(&schedule, &montreal(2026, 2, 9, 0, 30)).expect("next");
        assert_eq!("01:10", next.departure);
        assert_eq!(40, next.minutes_until);
    }

    #[test]
    fn fallback_metro_from_file() {
        let metro = super::fallback_metro(&schedule(), &montreal(2026, 2, 9, 15, 30));
        assert_eq!("Rosemont", metro.station);
        assert_eq!(Some(8), metro.minutes_until);
        assert_eq!(Some("15:38".to_string()), metro.next_departure);

        // Once 15:38 has gone the timetable moves on to the next train.
        let later = super::fallback_metro(&schedule(), &montreal(2026, 2, 9, 15, 40));
        assert_eq!(Some("15:46".to_string()), later.next_departure);
        assert_eq!(Some(6), later.minutes_until);
    }

    #[test]
    fn missing_fallback_file() {
        match super::load_schedule("testdata/missing.json") {
            Err(crate::result::DashError::NoFallbackAvailable(_)) => {},
            other => panic!("expected NoFallbackAvailable, got {:?}", other),
        }
    }

    #[test]
    fn countdown_wraps_past_midnight() {
        assert_eq!(Some(8), super::minutes_until("15:38", &montreal(2026, 2, 9, 15, 30)));
        assert_eq!(Some(0), super::minutes_until("15:30", &montreal(2026, 2, 9, 15, 30)));
        assert_eq!(Some(15), super::minutes_until("00:05", &montreal(2026, 2, 9, 23, 50)));
        assert_eq!(None, super::minutes_until("later", &montreal(2026, 2, 9, 15, 30)));
    }

    #[test]
    fn departed_train_has_no_countdown() {
        assert_eq!(None, super::minutes_until("15:38", &montreal(2026, 2, 8, 15, 40)));
        assert_eq!(None, super::minutes_until("15:25", &montreal(2026, 2, 9, 15, 30)));
        assert_eq!(None, super::minutes_until("23:58", &montreal(2026, 2, 10, 0, 10)));
    }
}
