//! Unix time to calendar conversion.
//!
//! Uses Howard Hinnant's `civil_from_days` algorithm
//! (<http://howardhinnant.github.io/date_algorithms.html>): O(1), correct for
//! every date in the proleptic Gregorian calendar.

use core::fmt;

const SECONDS_PER_DAY: i64 = 86_400;

/// Days from 0000-03-01 to 1970-01-01
const EPOCH_SHIFT_DAYS: i64 = 719_468;

const DAYS_PER_ERA: i64 = 146_097;

const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Broken-down UTC time, displayed like C's `ctime` without the trailing
/// newline: `Thu Jan  1 00:00:00 1970`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub struct CalendarTime {
    /// Full year
    pub year: i64,
    /// 1..=12
    pub month: u8,
    /// 1..=31
    pub day: u8,
    /// 0..=23
    pub hour: u8,
    /// 0..=59
    pub minute: u8,
    /// 0..=59
    pub second: u8,
    /// 0 = Sunday
    pub weekday: u8,
}

impl CalendarTime {
    /// Break down seconds since the Unix epoch. Negative values count back
    /// from 1970.
    pub fn from_unix(unix_secs: i64) -> Self {
        let days = unix_secs.div_euclid(SECONDS_PER_DAY);
        let secs_today = unix_secs.rem_euclid(SECONDS_PER_DAY);

        let (year, month, day) = civil_from_days(days);

        CalendarTime {
            year,
            month,
            day,
            hour: (secs_today / 3600) as u8,
            minute: ((secs_today % 3600) / 60) as u8,
            second: (secs_today % 60) as u8,
            // 1970-01-01 was a Thursday
            weekday: (days + 4).rem_euclid(7) as u8,
        }
    }
}

impl fmt::Display for CalendarTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {:2} {:02}:{:02}:{:02} {}",
            WEEKDAYS[self.weekday as usize % 7],
            MONTHS[(self.month as usize + 11) % 12],
            self.day,
            self.hour,
            self.minute,
            self.second,
            self.year
        )
    }
}

/// Convert days since the Unix epoch to (year, month, day).
fn civil_from_days(days_since_epoch: i64) -> (i64, u8, u8) {
    // Shift the epoch to 0000-03-01 so the leap day ends the year
    let z = days_since_epoch + EPOCH_SHIFT_DAYS;
    let era = z.div_euclid(DAYS_PER_ERA);
    // [0, 146096]
    let doe = z.rem_euclid(DAYS_PER_ERA);
    // [0, 399]
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
    // [0, 365]
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    // March-based month [0, 11]
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u8;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u8;
    let year = yoe + era * 400 + i64::from(month <= 2);

    (year, month, day)
}
