use chrono::{DateTime, NaiveDateTime, TimeZone, Timelike};
use serde::{Serialize, Serializer};
use std::{collections::BTreeSet, fmt, str::FromStr, time::Duration};

/// A wall-clock time of day with minute granularity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotTime {
    hour: u8,
    minute: u8,
}

impl SlotTime {
    pub const fn new(hour: u8, minute: u8) -> Self {
        Self { hour, minute }
    }

    /// Truncates a local timestamp to its minute.
    pub fn from_local(now: &NaiveDateTime) -> Self {
        Self {
            hour: now.hour() as u8,
            minute: now.minute() as u8,
        }
    }

    /// 12-hour rendering used in customer-facing copy, e.g. `7:30 AM`.
    pub fn to_twelve_hour(self) -> String {
        let suffix = if self.hour < 12 { "AM" } else { "PM" };
        let h = match self.hour % 12 {
            0 => 12,
            h => h,
        };
        format!("{h}:{:02} {suffix}", self.minute)
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl Serialize for SlotTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl FromStr for SlotTime {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let (h, m) = s
            .split_once(':')
            .ok_or_else(|| anyhow::anyhow!("invalid time '{s}': expected HH:MM"))?;
        let hour: u8 = h
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid time '{s}': bad hour"))?;
        let minute: u8 = m
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid time '{s}': bad minute"))?;
        if hour > 23 || minute > 59 || m.len() != 2 {
            anyhow::bail!("invalid time '{s}': out of range");
        }
        Ok(Self { hour, minute })
    }
}

/// Times of day at which food is ready.
pub const FOOD_TIMES: [SlotTime; 6] = [
    SlotTime::new(7, 30),
    SlotTime::new(10, 0),
    SlotTime::new(12, 30),
    SlotTime::new(14, 0),
    SlotTime::new(15, 30),
    SlotTime::new(16, 0),
];

/// Returns the schedule entry equal to `slot`, if any. Exact minute match only.
pub fn scheduled_slot(slot: SlotTime) -> Option<SlotTime> {
    FOOD_TIMES.iter().copied().find(|t| *t == slot)
}

/// Slots already alerted since the last local midnight.
#[derive(Debug, Default)]
pub struct NotifiedRegistry {
    slots: BTreeSet<SlotTime>,
}

impl NotifiedRegistry {
    pub fn contains(&self, slot: SlotTime) -> bool {
        self.slots.contains(&slot)
    }

    /// Returns false if the slot was already recorded.
    pub fn mark(&mut self, slot: SlotTime) -> bool {
        self.slots.insert(slot)
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots.len()
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> impl Iterator<Item = SlotTime> + '_ {
        self.slots.iter().copied()
    }
}

/// Time left until the next local midnight in `now`'s time zone.
///
/// Computed from the calendar rather than as `24h - elapsed`, so days that
/// are 23 or 25 hours long around DST switches still reset at midnight. A
/// midnight that does not exist locally resolves to the first valid instant
/// after it; an ambiguous one to the earlier instant.
pub fn duration_until_next_midnight<Tz: TimeZone>(now: &DateTime<Tz>) -> Duration {
    let tz = now.timezone();
    let next = now
        .date_naive()
        .succ_opt()
        .and_then(|tomorrow| {
            let midnight = tomorrow.and_hms_opt(0, 0, 0)?;
            tz.from_local_datetime(&midnight).earliest().or_else(|| {
                // Skipped midnight: walk forward until the local clock exists again.
                (1..=24 * 4).find_map(|quarter| {
                    let probe = midnight + chrono::Duration::minutes(15 * quarter);
                    tz.from_local_datetime(&probe).earliest()
                })
            })
        });

    match next {
        Some(next) => (next - now.clone())
            .to_std()
            .unwrap_or(Duration::ZERO),
        None => Duration::from_secs(24 * 60 * 60),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, LocalResult, NaiveDate};

    fn local(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 14)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn schedule_is_ordered_and_unique() {
        let mut sorted = FOOD_TIMES.to_vec();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted, FOOD_TIMES.to_vec());
        let rendered: Vec<String> = FOOD_TIMES.iter().map(|t| t.to_string()).collect();
        assert_eq!(
            rendered,
            ["07:30", "10:00", "12:30", "14:00", "15:30", "16:00"]
        );
    }

    #[test]
    fn scheduled_slot_requires_exact_minute() {
        assert_eq!(
            scheduled_slot(SlotTime::from_local(&local(10, 0, 59))),
            Some(SlotTime::new(10, 0))
        );
        assert_eq!(scheduled_slot(SlotTime::from_local(&local(10, 1, 0))), None);
        assert_eq!(scheduled_slot(SlotTime::from_local(&local(9, 59, 59))), None);
    }

    #[test]
    fn slot_time_parses_and_renders() {
        let t: SlotTime = "07:30".parse().unwrap();
        assert_eq!(t, SlotTime::new(7, 30));
        assert_eq!(t.to_twelve_hour(), "7:30 AM");
        assert_eq!(SlotTime::new(14, 0).to_twelve_hour(), "2:00 PM");
        assert_eq!(SlotTime::new(0, 5).to_twelve_hour(), "12:05 AM");
        assert_eq!(SlotTime::new(12, 30).to_twelve_hour(), "12:30 PM");
        assert!("24:00".parse::<SlotTime>().is_err());
        assert!("10:5".parse::<SlotTime>().is_err());
        assert!("noon".parse::<SlotTime>().is_err());
    }

    #[test]
    fn registry_never_holds_duplicates() {
        let mut reg = NotifiedRegistry::default();
        assert!(reg.mark(SlotTime::new(10, 0)));
        assert!(!reg.mark(SlotTime::new(10, 0)));
        assert!(reg.mark(SlotTime::new(12, 30)));
        assert_eq!(reg.len(), 2);
        assert!(reg.contains(SlotTime::new(10, 0)));
        reg.clear();
        assert!(reg.is_empty());
    }

    #[test]
    fn next_midnight_in_fixed_offset() {
        let tz = FixedOffset::east_opt(3600).unwrap();
        let now = tz.from_local_datetime(&local(23, 59, 30)).unwrap();
        assert_eq!(duration_until_next_midnight(&now), Duration::from_secs(30));

        let now = tz.from_local_datetime(&local(0, 0, 0)).unwrap();
        assert_eq!(
            duration_until_next_midnight(&now),
            Duration::from_secs(24 * 60 * 60)
        );

        let now = tz.from_local_datetime(&local(10, 0, 0)).unwrap();
        assert_eq!(
            duration_until_next_midnight(&now),
            Duration::from_secs(14 * 60 * 60)
        );
    }

    /// Zone whose offset switches from `BEFORE` to `AFTER` seconds east of
    /// UTC at 2026-03-15 00:00 UTC.
    #[derive(Clone, Copy, Debug)]
    struct Shift<const BEFORE: i32, const AFTER: i32>;

    /// Local clock jumps from 00:00 to 01:00: midnight never happens.
    type SpringForward = Shift<0, 3600>;
    /// Local clock falls back from 01:00 to 00:00: midnight happens twice.
    type FallBack = Shift<3600, 0>;

    impl<const BEFORE: i32, const AFTER: i32> Shift<BEFORE, AFTER> {
        fn switch_utc() -> NaiveDateTime {
            NaiveDate::from_ymd_opt(2026, 3, 15)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        }

        fn offset(secs: i32) -> FixedOffset {
            FixedOffset::east_opt(secs).unwrap()
        }
    }

    impl<const BEFORE: i32, const AFTER: i32> TimeZone for Shift<BEFORE, AFTER> {
        type Offset = FixedOffset;

        fn from_offset(_offset: &FixedOffset) -> Self {
            Shift
        }

        fn offset_from_local_date(&self, local: &NaiveDate) -> LocalResult<FixedOffset> {
            self.offset_from_local_datetime(&local.and_hms_opt(0, 0, 0).unwrap())
        }

        fn offset_from_local_datetime(&self, local: &NaiveDateTime) -> LocalResult<FixedOffset> {
            let switch = Self::switch_utc();
            let as_before = *local - chrono::Duration::seconds(BEFORE as i64) < switch;
            let as_after = *local - chrono::Duration::seconds(AFTER as i64) >= switch;
            match (as_before, as_after) {
                (true, true) => {
                    LocalResult::Ambiguous(Self::offset(BEFORE), Self::offset(AFTER))
                }
                (true, false) => LocalResult::Single(Self::offset(BEFORE)),
                (false, true) => LocalResult::Single(Self::offset(AFTER)),
                (false, false) => LocalResult::None,
            }
        }

        fn offset_from_utc_date(&self, utc: &NaiveDate) -> FixedOffset {
            self.offset_from_utc_datetime(&utc.and_hms_opt(0, 0, 0).unwrap())
        }

        fn offset_from_utc_datetime(&self, utc: &NaiveDateTime) -> FixedOffset {
            if *utc < Self::switch_utc() {
                Self::offset(BEFORE)
            } else {
                Self::offset(AFTER)
            }
        }
    }

    #[test]
    fn skipped_midnight_resets_when_the_clock_resumes() {
        let tz = SpringForward::from_offset(&FixedOffset::east_opt(0).unwrap());
        let midnight = NaiveDate::from_ymd_opt(2026, 3, 15)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert!(tz.from_local_datetime(&midnight).earliest().is_none());

        // 23:00 local; the next valid local instant is 01:00, one real hour later.
        let now = tz.from_local_datetime(&local(23, 0, 0)).single().unwrap();
        assert_eq!(
            duration_until_next_midnight(&now),
            Duration::from_secs(60 * 60)
        );
    }

    #[test]
    fn repeated_midnight_resets_at_the_first_one() {
        let tz = FallBack::from_offset(&FixedOffset::east_opt(3600).unwrap());
        let midnight = NaiveDate::from_ymd_opt(2026, 3, 15)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert!(matches!(
            tz.from_local_datetime(&midnight),
            LocalResult::Ambiguous(_, _)
        ));

        // The later midnight would be two real hours away.
        let now = tz.from_local_datetime(&local(23, 0, 0)).single().unwrap();
        assert_eq!(
            duration_until_next_midnight(&now),
            Duration::from_secs(60 * 60)
        );
    }
}
