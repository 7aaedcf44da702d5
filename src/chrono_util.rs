use anyhow::bail;
use chrono::{Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use primeweb_scraping_utils::regex;

use crate::schema::Delta;

pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Signedness {
    Signed,
    Unsigned,
}

/// Finds the first `H:MM` in `text` and reads it as a duration.
///
/// With [`Signedness::Signed`], a leading `-` negates hours and minutes
/// alike, so `-0:30` is minus thirty minutes.  With
/// [`Signedness::Unsigned`] the sign is ignored.
pub fn parse_delta(text: &str, signedness: Signedness) -> Option<Delta> {
    let captures = match signedness {
        Signedness::Signed => regex!(r"(-?)(\d+):(\d+)").captures(text)?,
        Signedness::Unsigned => regex!(r"()(\d+):(\d+)").captures(text)?,
    };
    let hours: i64 = captures[2].parse().ok()?;
    let minutes: i64 = captures[3].parse().ok()?;
    let minutes = hours.checked_mul(60)?.checked_add(minutes)?;
    Delta::try_from_minutes(if &captures[1] == "-" {
        -minutes
    } else {
        minutes
    })
}

/// Finds the first `H:MM` in `text` and reads it as a time of day.
pub fn parse_wall_clock(text: &str) -> Option<NaiveTime> {
    let captures = regex!(r"(\d+):(\d+)").captures(text)?;
    NaiveTime::from_hms_opt(captures[1].parse().ok()?, captures[2].parse().ok()?, 0)
}

/// Format expected by the report form.
pub fn format_form_date(date: NaiveDate) -> String {
    date.format("%d.%m.%Y").to_string()
}

/// Parses a date given on the command line.
pub fn parse_date_arg(s: &str) -> anyhow::Result<NaiveDate> {
    parse_date_relative_to(s, Local::now().date_naive())
}

pub fn parse_date_relative_to(s: &str, today: NaiveDate) -> anyhow::Result<NaiveDate> {
    let s = s.trim();
    match s.to_ascii_lowercase().as_str() {
        "today" | "heute" => return Ok(today),
        "yesterday" | "gestern" => return Ok(today - Duration::days(1)),
        _ => {}
    }
    for format in ["%Y-%m-%d", "%d.%m.%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return Ok(date);
        }
    }
    bail!("Unrecognized date {s:?}; expected YYYY-MM-DD, DD.MM.YYYY, today or yesterday")
}
