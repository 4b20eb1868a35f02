// src/grades.rs
use crate::day::SECONDS_IN_DAY;
use crate::models::GradeEvent;

/// Grade events in `[day, day + 1 day)`, in input order.
///
/// Half-open like the flow window, so consecutive days partition the events.
pub fn grade_events_for_day(day: i64, events: &[GradeEvent]) -> Vec<GradeEvent> {
    let day_end = day.saturating_add(SECONDS_IN_DAY);
    events
        .iter()
        .filter(|e| day <= e.transaction.timestamp && e.transaction.timestamp < day_end)
        .cloned()
        .collect()
}
