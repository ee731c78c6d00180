//! Daily trigger derivation: IANA timezone + local `HH:MM` -> recurring
//! fire instants (second fixed to zero, day/month/weekday wildcard).

use chrono::{DateTime, Days, Duration as ChronoDuration, LocalResult, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::core::config::AppSpec;
use crate::core::errors::{LogVaultError, Result};

/// One application's recurring daily trigger.
///
/// Each trigger carries its own immutable copy of the spec that produced it;
/// a rebuilt set never shares state with a replaced one.
#[derive(Debug, Clone)]
pub struct DailyTrigger {
    spec: AppSpec,
    zone: Tz,
    fire_time: NaiveTime,
}

impl DailyTrigger {
    /// Resolve the spec's timezone and start time into a trigger.
    ///
    /// Failure is per-app: the caller logs and skips this spec without
    /// aborting the rest of the rebuild.
    pub fn from_spec(spec: &AppSpec) -> Result<Self> {
        let zone: Tz =
            spec.exec_time
                .time_zone
                .parse()
                .map_err(|e| LogVaultError::InvalidSchedule {
                    app: spec.name.clone(),
                    details: format!("timezone {:?}: {e}", spec.exec_time.time_zone),
                })?;
        let fire_time = NaiveTime::parse_from_str(&spec.exec_time.start_time, "%H:%M").map_err(
            |e| LogVaultError::InvalidSchedule {
                app: spec.name.clone(),
                details: format!("start time {:?}: {e}", spec.exec_time.start_time),
            },
        )?;
        Ok(Self {
            spec: spec.clone(),
            zone,
            fire_time,
        })
    }

    /// Application name this trigger fires for.
    pub fn app(&self) -> &str {
        &self.spec.name
    }

    /// The spec snapshot captured at rebuild time.
    pub const fn spec(&self) -> &AppSpec {
        &self.spec
    }

    /// Human-readable schedule, e.g. `02:30 Asia/Shanghai`.
    #[must_use]
    pub fn describe(&self) -> String {
        format!("{} {}", self.fire_time.format("%H:%M"), self.zone)
    }

    /// First fire instant strictly after `after`.
    ///
    /// DST rules: an ambiguous local time (fall-back overlap) resolves to the
    /// earliest instant; a nonexistent local time (spring-forward gap) fires
    /// one hour later that day. Consecutive fires are one calendar day apart.
    #[must_use]
    pub fn next_fire_after(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        let local_after = after.with_timezone(&self.zone);

        // Today and up to two following days cover every gap/overlap case.
        for day_offset in 0..=2u64 {
            let Some(date) = local_after
                .date_naive()
                .checked_add_days(Days::new(day_offset))
            else {
                continue;
            };
            let naive = date.and_time(self.fire_time);
            let candidate = match self.zone.from_local_datetime(&naive) {
                LocalResult::Single(t) | LocalResult::Ambiguous(t, _) => Some(t),
                LocalResult::None => {
                    match self
                        .zone
                        .from_local_datetime(&(naive + ChronoDuration::hours(1)))
                    {
                        LocalResult::Single(t) | LocalResult::Ambiguous(t, _) => Some(t),
                        LocalResult::None => None,
                    }
                }
            };
            if let Some(t) = candidate {
                let utc = t.with_timezone(&Utc);
                if utc > after {
                    return utc;
                }
            }
        }

        // Unreachable for real zones; flat day as a defensive fallback.
        after + ChronoDuration::hours(24)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Schedule;
    use chrono::Timelike;
    use proptest::prelude::*;

    fn spec(name: &str, zone: &str, time: &str) -> AppSpec {
        AppSpec {
            name: name.to_string(),
            log_dir: std::path::PathBuf::from("/var/log/app"),
            log_files: vec!["app.log".to_string()],
            empty_origin: false,
            exec_time: Schedule {
                time_zone: zone.to_string(),
                start_time: time.to_string(),
            },
        }
    }

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn bad_timezone_is_per_app_error() {
        let err = DailyTrigger::from_spec(&spec("api", "Mars/Olympus", "02:30")).unwrap_err();
        assert_eq!(err.code(), "LV-1101");
        assert!(err.to_string().contains("api"));
    }

    #[test]
    fn bad_start_time_is_per_app_error() {
        let err = DailyTrigger::from_spec(&spec("api", "UTC", "25:99")).unwrap_err();
        assert_eq!(err.code(), "LV-1101");
    }

    #[test]
    fn seconds_are_not_accepted_in_start_time() {
        assert!(DailyTrigger::from_spec(&spec("api", "UTC", "02:30:15")).is_err());
    }

    #[test]
    fn fires_later_today_when_time_not_yet_reached() {
        let t = DailyTrigger::from_spec(&spec("api", "UTC", "14:00")).unwrap();
        let next = t.next_fire_after(utc("2026-03-02T08:00:00Z"));
        assert_eq!(next, utc("2026-03-02T14:00:00Z"));
    }

    #[test]
    fn fires_tomorrow_when_time_already_passed() {
        let t = DailyTrigger::from_spec(&spec("api", "UTC", "14:00")).unwrap();
        let next = t.next_fire_after(utc("2026-03-02T15:00:00Z"));
        assert_eq!(next, utc("2026-03-03T14:00:00Z"));
    }

    #[test]
    fn fire_at_exact_instant_advances_to_next_day() {
        // Strictly-after semantics: the instant itself has just fired.
        let t = DailyTrigger::from_spec(&spec("api", "UTC", "14:00")).unwrap();
        let next = t.next_fire_after(utc("2026-03-02T14:00:00Z"));
        assert_eq!(next, utc("2026-03-03T14:00:00Z"));
    }

    #[test]
    fn resolves_local_time_in_configured_zone() {
        // 02:30 in Shanghai (UTC+8, no DST) is 18:30 UTC the previous day.
        let t = DailyTrigger::from_spec(&spec("api", "Asia/Shanghai", "02:30")).unwrap();
        let next = t.next_fire_after(utc("2026-03-02T10:00:00Z"));
        assert_eq!(next, utc("2026-03-02T18:30:00Z"));
        assert_eq!(next.with_timezone(&chrono_tz::Asia::Shanghai).hour(), 2);
        assert_eq!(next.with_timezone(&chrono_tz::Asia::Shanghai).minute(), 30);
    }

    #[test]
    fn spring_forward_gap_fires_one_hour_later() {
        // US DST 2026: clocks jump 02:00 -> 03:00 on March 8. A 02:30 trigger
        // has no valid local instant that day and fires at 03:30 local.
        let t = DailyTrigger::from_spec(&spec("api", "America/New_York", "02:30")).unwrap();
        let next = t.next_fire_after(utc("2026-03-08T01:00:00-05:00"));
        let local = next.with_timezone(&chrono_tz::America::New_York);
        assert_eq!(local.hour(), 3);
        assert_eq!(local.minute(), 30);
    }

    #[test]
    fn fall_back_overlap_resolves_to_earliest_instant() {
        // US DST end 2026: 01:30 occurs twice on November 1. The earlier
        // (still-DST) instant wins.
        let t = DailyTrigger::from_spec(&spec("api", "America/New_York", "01:30")).unwrap();
        let next = t.next_fire_after(utc("2026-11-01T00:00:00-04:00"));
        assert_eq!(next, utc("2026-11-01T01:30:00-04:00"));
    }

    #[test]
    fn consecutive_fires_are_one_calendar_day_apart() {
        let t = DailyTrigger::from_spec(&spec("api", "Europe/Berlin", "05:15")).unwrap();
        let mut fire = t.next_fire_after(utc("2026-03-25T00:00:00Z"));
        for _ in 0..10 {
            let following = t.next_fire_after(fire);
            let gap = following - fire;
            assert!(
                gap >= ChronoDuration::hours(23) && gap <= ChronoDuration::hours(25),
                "gap {gap} out of range at {fire}"
            );
            fire = following;
        }
    }

    proptest! {
        #[test]
        fn next_fire_always_strictly_future_and_daily(
            hour in 0u32..24,
            minute in 0u32..60,
            zone_idx in 0usize..5,
            start_day in 0i64..365,
        ) {
            let zones = [
                "UTC",
                "America/New_York",
                "Europe/Berlin",
                "Asia/Shanghai",
                "Australia/Sydney",
            ];
            let t = DailyTrigger::from_spec(&spec(
                "p",
                zones[zone_idx],
                &format!("{hour:02}:{minute:02}"),
            ))
            .unwrap();

            let after = utc("2026-01-01T00:00:00Z") + ChronoDuration::days(start_day);
            let first = t.next_fire_after(after);
            prop_assert!(first > after);

            let second = t.next_fire_after(first);
            let gap = second - first;
            prop_assert!(gap >= ChronoDuration::hours(23), "gap {gap}");
            prop_assert!(gap <= ChronoDuration::hours(25), "gap {gap}");
        }
    }
}
