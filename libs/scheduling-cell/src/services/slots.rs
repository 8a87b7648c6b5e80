// libs/scheduling-cell/src/services/slots.rs
//
// Slot generation is deliberately pure: working-hour interval in, ordered
// start times out. All arithmetic happens on minutes-since-midnight
// integers; times are formatted to zero-padded HH:MM only at the edge.

use chrono::{NaiveTime, Timelike};

/// Generate bookable start times at fixed `slot_minutes` increments inside
/// `[start, end)`. Returns an empty sequence when the window is shorter than
/// one slot. With a lunch break given, any candidate whose interval touches
/// the break window is dropped; the grid itself does not shift.
pub fn generate_slot_times(
    start: NaiveTime,
    end: NaiveTime,
    slot_minutes: u32,
    lunch_break: Option<(NaiveTime, NaiveTime)>,
) -> Vec<String> {
    if slot_minutes == 0 {
        return Vec::new();
    }

    let start_minutes = minutes_since_midnight(start);
    let end_minutes = minutes_since_midnight(end);

    if end_minutes <= start_minutes || end_minutes - start_minutes < slot_minutes {
        return Vec::new();
    }

    let lunch = lunch_break.map(|(from, to)| {
        (minutes_since_midnight(from), minutes_since_midnight(to))
    });

    let mut times = Vec::new();
    let mut candidate = start_minutes;

    while candidate < end_minutes {
        if !overlaps_lunch(candidate, candidate + slot_minutes, lunch) {
            times.push(format_hhmm(candidate));
        }
        candidate += slot_minutes;
    }

    times
}

/// A candidate `[slot_start, slot_end)` collides with the break when it
/// starts inside it, ends inside it, or spans it entirely.
fn overlaps_lunch(slot_start: u32, slot_end: u32, lunch: Option<(u32, u32)>) -> bool {
    let Some((break_start, break_end)) = lunch else {
        return false;
    };

    let starts_inside = slot_start >= break_start && slot_start < break_end;
    let ends_inside = slot_end > break_start && slot_end <= break_end;
    let spans = slot_start < break_start && slot_end > break_end;

    starts_inside || ends_inside || spans
}

fn minutes_since_midnight(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

fn format_hhmm(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}
