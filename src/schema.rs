use std::{collections::BTreeMap, fmt::Display, str::FromStr};

use anyhow::Context;
use chrono::{Days, Duration, NaiveDate, NaiveDateTime};
use derive_more::{Deref, From, Into, IntoIterator};
use getset::{CopyGetters, Getters};
use log::warn;
use primeweb_scraping_utils::regex;
use serde::Serialize;
use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;

/// Signed duration as it appears in the target and balance columns.
///
/// Displayed as `+H:MM:SS` or `-H:MM:SS`.
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Debug,
    From,
    Into,
    SerializeDisplay,
    DeserializeFromStr,
)]
pub struct Delta(Duration);
impl Delta {
    pub fn from_minutes(minutes: i64) -> Self {
        Self(Duration::minutes(minutes))
    }

    /// Like [`Delta::from_minutes`], but `None` if the value exceeds the
    /// representable range.
    pub fn try_from_minutes(minutes: i64) -> Option<Self> {
        Duration::try_minutes(minutes).map(Self)
    }

    pub fn duration(self) -> Duration {
        self.0
    }

    pub fn is_negative(self) -> bool {
        self.0 < Duration::zero()
    }

    /// Magnitude formatted as `H:MM:SS`, without a sign.
    pub fn hms(self) -> String {
        let seconds = self.0.num_seconds().unsigned_abs();
        format!(
            "{}:{:02}:{:02}",
            seconds / 3600,
            seconds / 60 % 60,
            seconds % 60
        )
    }
}
impl Display for Delta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.is_negative() { '-' } else { '+' };
        write!(f, "{sign}{}", self.hms())
    }
}

#[derive(PartialEq, Eq, Debug, Error)]
pub enum DeltaParseError {
    #[error("Expected `[+-]H:MM[:SS]`, found {0:?}")]
    InvalidFormat(String),
    #[error("Component out of range in {0:?}")]
    OutOfRange(String),
}
impl FromStr for Delta {
    type Err = DeltaParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let captures = regex!(r"^([+-]?)(\d+):([0-5]\d)(?::([0-5]\d))?$")
            .captures(s.trim())
            .ok_or_else(|| DeltaParseError::InvalidFormat(s.to_owned()))?;
        let out_of_range = || DeltaParseError::OutOfRange(s.to_owned());
        let hours: i64 = captures[2].parse().map_err(|_| out_of_range())?;
        let minutes: i64 = captures[3].parse().map_err(|_| out_of_range())?;
        let seconds: i64 = match captures.get(4) {
            Some(seconds) => seconds.as_str().parse().map_err(|_| out_of_range())?,
            None => 0,
        };
        let total = hours
            .checked_mul(3600)
            .and_then(|x| x.checked_add(minutes * 60 + seconds))
            .ok_or_else(out_of_range)?;
        let total = if &captures[1] == "-" { -total } else { total };
        Duration::try_seconds(total)
            .map(Self)
            .ok_or_else(out_of_range)
    }
}

/// A continuous stretch between one check-in and one check-out.
///
/// Every field is optional because the journal routinely shows half-filled
/// bookings, e.g. a check-in without check-out for the current day.
#[derive(Clone, PartialEq, Eq, Debug, Default, CopyGetters, Serialize)]
#[getset(get_copy = "pub")]
pub struct Period {
    #[serde(skip_serializing_if = "Option::is_none")]
    login: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    logout: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration: Option<Delta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<Delta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    day_balance: Option<Delta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    total_balance: Option<Delta>,
}
impl Period {
    pub fn new(
        login: Option<NaiveDateTime>,
        logout: Option<NaiveDateTime>,
        target: Option<Delta>,
        day_balance: Option<Delta>,
        total_balance: Option<Delta>,
    ) -> Self {
        let duration = login
            .zip(logout)
            .map(|(login, logout)| Delta::from(logout - login));
        Self {
            login,
            logout,
            duration,
            target,
            day_balance,
            total_balance,
        }
    }
}

/// Code shown in the info column of a booking.
#[derive(Clone, Copy, PartialEq, Eq, Debug, strum::Display, strum::EnumIter)]
pub enum InfoCode {
    #[strum(to_string = "Deleted")]
    Deleted,
    #[strum(to_string = "Corrected relatively")]
    CorrectedRelatively,
    #[strum(to_string = "Corrected absolutely")]
    CorrectedAbsolutely,
    #[strum(to_string = "Erroneous entry")]
    Erroneous,
    #[strum(to_string = "Holiday")]
    Holiday,
}
impl InfoCode {
    pub fn code(self) -> &'static str {
        match self {
            InfoCode::Deleted => "**",
            InfoCode::CorrectedRelatively => "++",
            InfoCode::CorrectedAbsolutely => "==",
            InfoCode::Erroneous => "FK",
            InfoCode::Holiday => "*",
        }
    }

    /// Whether a booking carrying this code was touched after the fact.
    pub fn is_correction(self) -> bool {
        !matches!(self, InfoCode::Holiday)
    }
}

#[derive(PartialEq, Eq, Debug, Error)]
#[error("Unknown info code: {0:?}")]
pub struct InfoCodeParseError(String);
impl FromStr for InfoCode {
    type Err = InfoCodeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "**" => InfoCode::Deleted,
            "++" => InfoCode::CorrectedRelatively,
            "==" => InfoCode::CorrectedAbsolutely,
            "FK" => InfoCode::Erroneous,
            "*" => InfoCode::Holiday,
            _ => return Err(InfoCodeParseError(s.to_owned())),
        })
    }
}

#[derive(Clone, PartialEq, Eq, Debug, From, derive_more::Display, Serialize)]
pub struct HolidayName(String);

#[derive(Clone, PartialEq, Eq, Debug, From, derive_more::Display, Serialize)]
pub struct DisplayName(String);

#[derive(Clone, PartialEq, Eq, Debug, From, derive_more::Display, Serialize)]
pub struct UserId(String);

/// One dated zebra row of the journal table.
#[derive(Clone, PartialEq, Eq, Debug, CopyGetters, Getters)]
pub struct JournalRow {
    #[getset(get_copy = "pub")]
    date: NaiveDate,
    #[getset(get_copy = "pub")]
    info: Option<InfoCode>,
    #[getset(get = "pub")]
    kind: RowKind,
}
impl JournalRow {
    pub fn new(date: NaiveDate, info: Option<InfoCode>, kind: RowKind) -> Self {
        Self { date, info, kind }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum RowKind {
    Normal(Period),
    /// A booking whose info code marks it as deleted, corrected or erroneous.
    Corrected(Period),
    Holiday(HolidayName),
    CompTime(String),
}

/// Annotation attached to a whole day.
#[derive(Clone, PartialEq, Eq, Debug, SerializeDisplay)]
pub enum DayInfo {
    Code(InfoCode),
    Note(String),
}
impl Display for DayInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DayInfo::Code(code) => write!(f, "{code}"),
            DayInfo::Note(note) => f.write_str(note),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Default, Getters, Serialize)]
#[getset(get = "pub")]
pub struct JournalDay {
    periods: Vec<Period>,
    #[serde(skip_serializing_if = "Option::is_none")]
    info: Option<DayInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    holiday: Option<HolidayName>,
}
impl JournalDay {
    /// Merges one row into the day.  Later rows overwrite the annotation.
    pub fn push(&mut self, row: JournalRow) {
        if let Some(code) = row.info {
            self.info = Some(DayInfo::Code(code));
        }
        match row.kind {
            RowKind::Normal(period) | RowKind::Corrected(period) => self.periods.push(period),
            RowKind::Holiday(name) => self.holiday = Some(name),
            RowKind::CompTime(note) => self.info = Some(DayInfo::Note(note)),
        }
    }
}

/// Attendance records keyed by calendar date.
#[derive(Clone, PartialEq, Eq, Debug, Default, Deref, IntoIterator, Serialize)]
pub struct Journal(BTreeMap<NaiveDate, JournalDay>);
impl FromIterator<JournalRow> for Journal {
    fn from_iter<I: IntoIterator<Item = JournalRow>>(iter: I) -> Self {
        let mut days = BTreeMap::<_, JournalDay>::new();
        for row in iter {
            days.entry(row.date).or_default().push(row);
        }
        Self(days)
    }
}

/// Inclusive range of days requested from the journal report.
#[derive(Clone, Copy, PartialEq, Eq, Debug, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}
impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if start > end {
            warn!("Start date {start} is after end date {end}");
        }
        Self { start, end }
    }

    /// Fills in missing bounds: `end` defaults to `today` and `start` to
    /// `default_days` before `end`.
    pub fn resolve(
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        today: NaiveDate,
        default_days: u32,
    ) -> anyhow::Result<Self> {
        let end = end.unwrap_or(today);
        let start = match start {
            Some(start) => start,
            None => end
                .checked_sub_days(Days::new(default_days.into()))
                .with_context(|| format!("{default_days} days before {end} is out of range"))?,
        };
        Ok(Self::new(start, end))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};
    use strum::IntoEnumIterator;

    use super::{
        DateRange, DayInfo, Delta, DeltaParseError, HolidayName, InfoCode, Journal, JournalRow,
        Period, RowKind,
    };

    fn at(date: NaiveDate, h: u32, m: u32) -> chrono::NaiveDateTime {
        date.and_time(NaiveTime::from_hms_opt(h, m, 0).unwrap())
    }

    #[test]
    fn display_delta() {
        assert_eq!(Delta::from_minutes(0).to_string(), "+0:00:00");
        assert_eq!(Delta::from_minutes(5).to_string(), "+0:05:00");
        assert_eq!(Delta::from_minutes(8 * 60 + 12).to_string(), "+8:12:00");
        assert_eq!(Delta::from_minutes(-30).to_string(), "-0:30:00");
        assert_eq!(Delta::from_minutes(-(25 * 60 + 1)).to_string(), "-25:01:00");
        assert_eq!(
            Delta::from(chrono::Duration::seconds(-3661)).to_string(),
            "-1:01:01"
        );
        assert_eq!(Delta::from_minutes(-90).hms(), "1:30:00");
    }

    #[test]
    fn parse_delta() {
        assert_eq!("0:30".parse(), Ok(Delta::from_minutes(30)));
        assert_eq!("+7:48:00".parse(), Ok(Delta::from_minutes(7 * 60 + 48)));
        assert_eq!("-0:15".parse(), Ok(Delta::from_minutes(-15)));
        assert_eq!(
            "-1:01:01".parse(),
            Ok(Delta::from(chrono::Duration::seconds(-3661)))
        );
        assert_eq!(
            "7.48".parse::<Delta>(),
            Err(DeltaParseError::InvalidFormat("7.48".into()))
        );
        assert!("1:60".parse::<Delta>().is_err());
        assert!(matches!(
            "99999999999999999999:00".parse::<Delta>(),
            Err(DeltaParseError::OutOfRange(_))
        ));
        assert_eq!(
            "9999999999999:00".parse::<Delta>(),
            Err(DeltaParseError::OutOfRange("9999999999999:00".into()))
        );
    }

    #[test]
    fn minutes_beyond_range_are_rejected() {
        assert_eq!(Delta::try_from_minutes(90), Some(Delta::from_minutes(90)));
        assert_eq!(Delta::try_from_minutes(i64::MAX / 60), None);
        assert_eq!(Delta::try_from_minutes(-(i64::MAX / 60)), None);
    }

    #[test]
    fn delta_display_parses_back() {
        for minutes in [-601, -1, 0, 1, 59, 60, 1439] {
            let delta = Delta::from_minutes(minutes);
            assert_eq!(delta.to_string().parse(), Ok(delta));
        }
    }

    #[test]
    fn info_codes() {
        for code in InfoCode::iter() {
            assert_eq!(code.code().parse(), Ok(code));
        }
        assert_eq!(InfoCode::Deleted.to_string(), "Deleted");
        assert_eq!(InfoCode::CorrectedRelatively.to_string(), "Corrected relatively");
        assert_eq!(InfoCode::Erroneous.to_string(), "Erroneous entry");
        assert!("***".parse::<InfoCode>().is_err());
        assert!("".parse::<InfoCode>().is_err());
        assert!(!InfoCode::Holiday.is_correction());
        assert!(InfoCode::CorrectedAbsolutely.is_correction());
    }

    #[test]
    fn period_duration_needs_both_ends() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let full = Period::new(Some(at(date, 8, 0)), Some(at(date, 12, 15)), None, None, None);
        assert_eq!(full.duration(), Some(Delta::from_minutes(4 * 60 + 15)));
        let half = Period::new(Some(at(date, 8, 0)), None, None, None, None);
        assert_eq!(half.duration(), None);
    }

    #[test]
    fn journal_groups_rows_by_date() {
        let monday = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let tuesday = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let morning = Period::new(Some(at(monday, 8, 0)), Some(at(monday, 12, 0)), None, None, None);
        let afternoon = Period::new(Some(at(monday, 12, 30)), None, None, None, None);
        let journal: Journal = [
            JournalRow::new(monday, None, RowKind::Normal(morning.clone())),
            JournalRow::new(
                monday,
                Some(InfoCode::CorrectedRelatively),
                RowKind::Corrected(afternoon.clone()),
            ),
            JournalRow::new(
                tuesday,
                Some(InfoCode::Holiday),
                RowKind::Holiday(HolidayName::from("Fastnacht".to_owned())),
            ),
        ]
        .into_iter()
        .collect();

        assert_eq!(journal.len(), 2);
        let day = &journal[&monday];
        assert_eq!(day.periods(), &vec![morning, afternoon]);
        assert_eq!(
            day.info(),
            &Some(DayInfo::Code(InfoCode::CorrectedRelatively))
        );
        let day = &journal[&tuesday];
        assert!(day.periods().is_empty());
        assert_eq!(day.holiday().as_ref().unwrap().to_string(), "Fastnacht");
    }

    #[test]
    fn comp_time_note_overrides_code() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let journal: Journal = [JournalRow::new(
            date,
            Some(InfoCode::Erroneous),
            RowKind::CompTime("Zeitausgleich".into()),
        )]
        .into_iter()
        .collect();
        assert_eq!(
            journal[&date].info(),
            &Some(DayInfo::Note("Zeitausgleich".into()))
        );
    }

    #[test]
    fn serialize_journal() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let period = Period::new(
            Some(at(date, 7, 45)),
            Some(at(date, 16, 3)),
            Some(Delta::from_minutes(7 * 60 + 48)),
            Some(Delta::from_minutes(-(7 * 60 + 48) + (8 * 60 + 18))),
            Some(Delta::from_minutes(-75)),
        );
        let journal: Journal = [JournalRow::new(date, None, RowKind::Normal(period))]
            .into_iter()
            .collect();
        assert_eq!(
            serde_json::to_string(&journal).unwrap(),
            r#"{"2024-03-04":{"periods":[{"login":"2024-03-04T07:45:00","logout":"2024-03-04T16:03:00","duration":"+8:18:00","target":"+7:48:00","day_balance":"+0:30:00","total_balance":"-1:15:00"}]}}"#
        );
    }

    #[test]
    fn resolve_date_range() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let range = DateRange::resolve(None, None, today, 3).unwrap();
        assert_eq!(range.start(), NaiveDate::from_ymd_opt(2023, 12, 30).unwrap());
        assert_eq!(range.end(), today);

        let end = NaiveDate::from_ymd_opt(2024, 2, 10).unwrap();
        let range = DateRange::resolve(None, Some(end), today, 7).unwrap();
        assert_eq!(range.start(), NaiveDate::from_ymd_opt(2024, 2, 3).unwrap());

        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let range = DateRange::resolve(Some(start), None, today, 3).unwrap();
        assert_eq!((range.start(), range.end()), (start, today));

        let err = DateRange::resolve(None, None, today, u32::MAX).unwrap_err();
        assert!(err.to_string().contains("out of range"));
        let range = DateRange::resolve(Some(start), None, today, u32::MAX).unwrap();
        assert_eq!(range.start(), start);
    }
}
