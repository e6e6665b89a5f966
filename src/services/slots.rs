//! Time-of-day arithmetic and candidate slot generation. Everything here is
//! pure: times are "HH:mm" 24-hour strings at the edges and
//! minutes-since-midnight internally.

/// Strict "HH:mm" parse: zero-padded, 24-hour. Returns minutes since
/// midnight.
pub fn parse_hhmm(s: &str) -> Option<u16> {
    let bytes = s.as_bytes();
    if bytes.len() != 5 || bytes[2] != b':' {
        return None;
    }
    if !bytes[0].is_ascii_digit()
        || !bytes[1].is_ascii_digit()
        || !bytes[3].is_ascii_digit()
        || !bytes[4].is_ascii_digit()
    {
        return None;
    }
    let hour = (bytes[0] - b'0') as u16 * 10 + (bytes[1] - b'0') as u16;
    let minute = (bytes[3] - b'0') as u16 * 10 + (bytes[4] - b'0') as u16;
    if hour > 23 || minute > 59 {
        return None;
    }
    Some(hour * 60 + minute)
}

pub fn format_hhmm(minutes: u16) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Every start time in `[open, close)` stepped by `interval_minutes` whose
/// end (`start + duration_minutes`) still fits within `close`. Empty when
/// the window is shorter than the duration or the interval is zero.
pub fn generate_slots(
    open: u16,
    close: u16,
    duration_minutes: u16,
    interval_minutes: u16,
) -> Vec<u16> {
    if interval_minutes == 0 {
        return Vec::new();
    }
    let mut slots = Vec::new();
    let mut t = open;
    while t < close && t + duration_minutes <= close {
        slots.push(t);
        t += interval_minutes;
    }
    slots
}

/// [start, start+duration) overlaps [booked_start, booked_end)? Half-open
/// intervals: touching endpoints do not overlap.
pub fn overlaps(start: u16, duration: u16, booked_start: u16, booked_end: u16) -> bool {
    start < booked_end && start + duration > booked_start
}
