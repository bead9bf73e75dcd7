//! US equity-market trading calendar.
//!
//! Weekends plus the full NYSE holiday schedule: fixed-date holidays with
//! observed shifts, floating nth-weekday holidays, and Good Friday derived
//! from the Easter computus. Half days are treated as open.

use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// Returns true if the US equity market is open on `date`.
pub fn is_market_open(date: NaiveDate) -> bool {
    match date.weekday() {
        Weekday::Sat | Weekday::Sun => false,
        _ => !is_holiday(date),
    }
}

fn is_holiday(date: NaiveDate) -> bool {
    let year = date.year();

    let mut holidays = vec![
        // New Year's Day. When Jan 1 falls on a Saturday the exchange does
        // not close the preceding Friday (it is the last trading day of the
        // prior year), so no Saturday shift here.
        observed_sunday_only(ymd(year, 1, 1)),
        nth_weekday(year, 1, Weekday::Mon, 3),  // Martin Luther King Jr. Day
        nth_weekday(year, 2, Weekday::Mon, 3),  // Washington's Birthday
        easter_sunday(year) - Duration::days(2), // Good Friday
        last_weekday(year, 5, Weekday::Mon),    // Memorial Day
        observed(ymd(year, 7, 4)),              // Independence Day
        nth_weekday(year, 9, Weekday::Mon, 1),  // Labor Day
        nth_weekday(year, 11, Weekday::Thu, 4), // Thanksgiving
        observed(ymd(year, 12, 25)),            // Christmas
    ];

    // Juneteenth became an exchange holiday in 2022.
    if year >= 2022 {
        holidays.push(observed(ymd(year, 6, 19)));
    }

    holidays.contains(&date)
}

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid fixed holiday date")
}

/// Saturday holidays close the preceding Friday, Sunday holidays the
/// following Monday.
fn observed(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date - Duration::days(1),
        Weekday::Sun => date + Duration::days(1),
        _ => date,
    }
}

fn observed_sunday_only(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sun => date + Duration::days(1),
        _ => date,
    }
}

fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: u32) -> NaiveDate {
    NaiveDate::from_weekday_of_month_opt(year, month, weekday, n as u8)
        .expect("nth weekday exists in month")
}

fn last_weekday(year: i32, month: u32, weekday: Weekday) -> NaiveDate {
    let fifth = NaiveDate::from_weekday_of_month_opt(year, month, weekday, 5);
    fifth.unwrap_or_else(|| {
        NaiveDate::from_weekday_of_month_opt(year, month, weekday, 4)
            .expect("fourth weekday always exists")
    })
}

/// Easter Sunday via the Meeus/Jones/Butcher Gregorian algorithm.
fn easter_sunday(year: i32) -> NaiveDate {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32).expect("computus yields a valid date")
}
