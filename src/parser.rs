use anyhow::Context;
use chrono::NaiveDate;
use itertools::Itertools;
use log::{debug, warn};
use primeweb_scraping_utils::{
    regex, selector,
    text::{first_text, trimmed_text},
};
use scraper::{ElementRef, Html};

use crate::{
    chrono_util::{parse_delta, parse_wall_clock, Signedness},
    schema::{DisplayName, HolidayName, InfoCode, Journal, JournalRow, Period, RowKind, UserId},
};

const COMP_TIME_KEYWORD: &str = "Zeitausgleich";

/// Finds the display name on the page returned after logging in.
///
/// The page labels it with a `font.beschriftung` reading `Name` and puts the
/// value into the next `font.beschriftung`.
pub fn parse_display_name(html: &Html) -> Option<DisplayName> {
    let labels = html.select(selector!("font.beschriftung")).collect_vec();
    let (_, value) = labels
        .iter()
        .tuple_windows()
        .find(|(label, _)| first_text(label).is_some_and(|text| text == "Name"))?;
    first_text(value)
        .filter(|text| !text.is_empty())
        .map(|text| DisplayName::from(text.to_owned()))
}

/// User selection embedded in the journal query page.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct JournalUser {
    pub id: UserId,
    pub name: Option<DisplayName>,
}

pub fn parse_journal_user(html: &Html) -> anyhow::Result<JournalUser> {
    let id = html
        .select(selector!(r#"input[name="LSTUSERS"]"#))
        .next()
        .context("User selection `LSTUSERS` was not found on the journal query page")?
        .value()
        .attr("value")
        .context("Attribute `value` not found for `LSTUSERS`")?
        .to_owned()
        .into();
    let name = html
        .select(selector!(r#"input[name="NNAME"]"#))
        .next()
        .and_then(|input| input.value().attr("value"))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| DisplayName::from(name.to_owned()));
    Ok(JournalUser { id, name })
}

/// Year of the next row, given the year and month of the previous dated row.
///
/// The journal only prints `day.month.`, so the year is carried over from the
/// previous row and bumped whenever the month goes backwards.
pub fn infer_year(year: i32, previous_month: Option<u32>, month: u32) -> i32 {
    match previous_month {
        Some(previous) if previous > month => year + 1,
        _ => year,
    }
}

#[derive(Clone, Copy, Debug)]
pub struct YearTracker {
    year: i32,
    previous_month: Option<u32>,
}
impl YearTracker {
    pub fn new(start_year: i32) -> Self {
        Self {
            year: start_year,
            previous_month: None,
        }
    }

    pub fn observe(&mut self, month: u32) -> i32 {
        self.year = infer_year(self.year, self.previous_month, month);
        self.previous_month = Some(month);
        self.year
    }
}

/// Parses the journal report table into rows.
///
/// `start_year` is the year of the first day requested; the years of later
/// rows are inferred from it.
pub fn parse_journal_rows(html: &Html, start_year: i32) -> anyhow::Result<Vec<JournalRow>> {
    let table = html
        .select(selector!("table#ScrollTable"))
        .next()
        .context("Journal table `#ScrollTable` was not found")?;
    let mut years = YearTracker::new(start_year);
    let rows = table
        .select(selector!(r#"tr[class*="ZebraRow"]"#))
        .filter_map(|tr| {
            let cells = tr
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|e| e.value().name() == "td")
                .map(trimmed_text)
                .collect_vec();
            parse_row(&cells, &mut years)
        })
        .collect_vec();
    debug!("Parsed {} journal rows", rows.len());
    Ok(rows)
}

pub fn parse_journal(html: &Html, start_year: i32) -> anyhow::Result<Journal> {
    Ok(parse_journal_rows(html, start_year)?.into_iter().collect())
}

fn parse_row(cells: &[String], years: &mut YearTracker) -> Option<JournalRow> {
    let cell = |i: usize| cells.get(i).map_or("", String::as_str);

    let (day, month) = parse_day_month(cell(0))?;
    let year = years.observe(month);
    let Some(date) = NaiveDate::from_ymd_opt(year, month, day) else {
        warn!("Skipping row with invalid date {day}.{month}.{year}");
        return None;
    };

    let info = cell(2).parse::<InfoCode>().ok();

    let check_in = cell(3);
    if let Some(captures) = regex!(r"\((.*)\)").captures(check_in) {
        let name = HolidayName::from(captures[1].to_owned());
        return Some(JournalRow::new(date, info, RowKind::Holiday(name)));
    }
    if check_in.contains(COMP_TIME_KEYWORD) {
        return Some(JournalRow::new(
            date,
            info,
            RowKind::CompTime(check_in.to_owned()),
        ));
    }

    let period = Period::new(
        parse_wall_clock(check_in).map(|time| date.and_time(time)),
        parse_wall_clock(cell(4)).map(|time| date.and_time(time)),
        parse_delta(cell(6), Signedness::Unsigned),
        parse_delta(cell(7), Signedness::Signed),
        parse_delta(cell(10), Signedness::Signed),
    );
    let kind = match info {
        Some(code) if code.is_correction() => RowKind::Corrected(period),
        _ => RowKind::Normal(period),
    };
    Some(JournalRow::new(date, info, kind))
}

fn parse_day_month(text: &str) -> Option<(u32, u32)> {
    let captures = regex!(r"^(\d+)\.(\d+)\.").captures(text)?;
    let day = captures[1].parse().ok()?;
    let month = captures[2].parse().ok()?;
    (1..=12).contains(&month).then_some((day, month))
}
