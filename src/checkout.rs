use std::fmt::Display;

use anyhow::Context;
use chrono::NaiveDateTime;
use getset::CopyGetters;

use crate::schema::{Delta, JournalDay};

/// When today's target is reached, derived from the latest booking.
#[derive(Clone, Copy, PartialEq, Eq, Debug, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct CheckoutProjection {
    check_in: NaiveDateTime,
    core_time: Option<Delta>,
    day_balance: Delta,
    check_out: NaiveDateTime,
    after_lunch_break: NaiveDateTime,
}

impl CheckoutProjection {
    /// Projects from the last period of `day`.
    ///
    /// The portal reports the balance of an open period as if it ended at the
    /// check-in, so the target check-out is the check-in minus that balance.
    pub fn from_day(day: Option<&JournalDay>, lunch_break: Delta) -> anyhow::Result<Self> {
        let period = day.and_then(|day| day.periods().last());
        let check_in = period.and_then(|period| period.login()).context(
            "Journal contains no check-in time for today. Have you checked in?",
        )?;
        let period = period.context("Journal contains no period for today")?;
        let day_balance = period
            .day_balance()
            .context("Journal contains no day balance for today")?;
        let check_out = check_in
            .checked_sub_signed(day_balance.duration())
            .context("Day balance is out of range")?;
        let after_lunch_break = check_out
            .checked_add_signed(lunch_break.duration())
            .context("Lunch break is out of range")?;
        Ok(Self {
            check_in,
            core_time: period.target(),
            day_balance,
            check_out,
            after_lunch_break,
        })
    }

    /// Time worked past the target check-out; negative while still short.
    pub fn delta(&self, now: NaiveDateTime) -> Delta {
        Delta::from(now - self.check_out)
    }

    pub fn status(&self, now: NaiveDateTime) -> CheckoutStatus {
        if self.check_out > now {
            CheckoutStatus::Remaining(Delta::from(self.check_out - now))
        } else if self.after_lunch_break > now {
            CheckoutStatus::Limbo(Delta::from(self.after_lunch_break - now))
        } else {
            CheckoutStatus::Overtime(Delta::from(now - self.after_lunch_break))
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CheckoutStatus {
    /// Core time is not reached yet.
    Remaining(Delta),
    /// Core time is reached, but the mandatory break is not covered yet.
    Limbo(Delta),
    Overtime(Delta),
}
impl Display for CheckoutStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckoutStatus::Remaining(delta) => write!(f, "You still have {} to go", delta.hms()),
            CheckoutStatus::Limbo(delta) => write!(
                f,
                "Core time is done. You are still {} in limbo",
                delta.hms()
            ),
            CheckoutStatus::Overtime(delta) => write!(
                f,
                "Time to check out. You are in overtime for {}",
                delta.hms()
            ),
        }
    }
}
