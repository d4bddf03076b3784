use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{Days, NaiveDate, NaiveDateTime, Timelike};

// ============================================================================
// Catalog - services on offer and pickup/delivery windows
// ============================================================================

/// First slot of the day starts at this hour
pub const FIRST_SLOT_HOUR: u32 = 9;
/// No slot ends after this hour
pub const LAST_SLOT_END_HOUR: u32 = 20;
/// Every slot is this many hours long
pub const SLOT_LENGTH_HOURS: u32 = 2;
/// Same-day slots need this much lead time
pub const SAME_DAY_LEAD_HOURS: u32 = 2;
/// Dates offered by default
pub const DEFAULT_DAYS_AHEAD: u32 = 14;

/// Catalog item, read-only to the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub price_per_unit: f64,
    /// e.g. "kg", "item", "pair"
    pub unit: String,
    pub estimated_hours: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub id: String,
    pub start_time: String,
    pub end_time: String,
    pub available: bool,
}

impl TimeSlot {
    pub fn label(&self) -> String {
        format!("{} - {}", self.start_time, self.end_time)
    }
}

/// `days_ahead` consecutive dates starting at `today`
pub fn available_dates(today: NaiveDate, days_ahead: u32) -> Vec<NaiveDate> {
    (0..days_ahead)
        .filter_map(|offset| today.checked_add_days(Days::new(u64::from(offset))))
        .collect()
}

/// Two-hour windows for `date`
///
/// Same-day requests skip windows that start within the lead time.
pub fn generate_time_slots(date: NaiveDate, now: NaiveDateTime) -> Vec<TimeSlot> {
    let start_hour = if date == now.date() {
        FIRST_SLOT_HOUR.max(now.hour() + SAME_DAY_LEAD_HOURS)
    } else {
        FIRST_SLOT_HOUR
    };

    (start_hour..LAST_SLOT_END_HOUR)
        .step_by(SLOT_LENGTH_HOURS as usize)
        .filter(|hour| hour + SLOT_LENGTH_HOURS <= LAST_SLOT_END_HOUR)
        .map(|hour| {
            let start_time = format!("{:02}:00", hour);
            let end_time = format!("{:02}:00", hour + SLOT_LENGTH_HOURS);
            TimeSlot {
                id: format!("slot-{}-{}", date, start_time),
                start_time,
                end_time,
                available: true,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    #[test]
    fn test_available_dates_are_consecutive() {
        let dates = available_dates(day(30), DEFAULT_DAYS_AHEAD);
        assert_eq!(dates.len(), 14);
        assert_eq!(dates[0], day(30));
        assert_eq!(dates[2], NaiveDate::from_ymd_opt(2026, 11, 1).unwrap());
    }

    #[test]
    fn test_future_day_has_full_schedule() {
        let now = day(19).and_hms_opt(18, 30, 0).unwrap();
        let slots = generate_time_slots(day(20), now);

        let labels: Vec<String> = slots.iter().map(TimeSlot::label).collect();
        assert_eq!(
            labels,
            vec!["09:00 - 11:00", "11:00 - 13:00", "13:00 - 15:00", "15:00 - 17:00", "17:00 - 19:00"]
        );
        assert!(slots.iter().all(|s| s.available));
        assert_eq!(slots[0].id, "slot-2026-10-20-09:00");
    }

    #[test]
    fn test_same_day_respects_lead_time() {
        let now = day(19).and_hms_opt(12, 15, 0).unwrap();
        let slots = generate_time_slots(day(19), now);

        assert_eq!(slots[0].start_time, "14:00");
        for slot in &slots {
            let hour: u32 = slot.start_time[..2].parse().unwrap();
            assert!(hour >= now.hour() + SAME_DAY_LEAD_HOURS);
        }
    }

    #[test]
    fn test_late_evening_has_no_slots_today() {
        let now = day(19).and_hms_opt(19, 0, 0).unwrap();
        assert!(generate_time_slots(day(19), now).is_empty());
    }
}
