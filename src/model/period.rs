use crate::error::BudgetError;
use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// A calendar month. Budgets, spend and every derived figure are computed for one `Period`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Result<Self, BudgetError> {
        if !(1..=12).contains(&month) || NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(BudgetError::InvalidPeriod(format!("{year}-{month:02}")));
        }
        Ok(Self { year, month })
    }

    /// The month containing `date`.
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The month of the local clock. Only used to pick a default month to show, whether a month
    /// is editable is always decided by the server.
    pub fn current() -> Self {
        Self::of(Local::now().date_naive())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn previous(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// The `count` months ending with (and including) this one, oldest first.
    pub fn trailing(&self, count: usize) -> Vec<Period> {
        let mut out = Vec::with_capacity(count);
        let mut p = *self;
        for _ in 0..count {
            out.push(p);
            p = p.previous();
        }
        out.reverse();
        out
    }
}

impl Display for Period {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = BudgetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BudgetError::InvalidPeriod(s.to_string());
        let (y, m) = s.trim().split_once('-').ok_or_else(invalid)?;
        let year: i32 = y.parse().map_err(|_| invalid())?;
        let month: u32 = m.parse().map_err(|_| invalid())?;
        Period::new(year, month).map_err(|_| invalid())
    }
}
