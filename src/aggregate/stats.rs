//! Rollups of one month's budgets and transactions in the display currency.
//!
//! Every figure is computed from whatever collections are loaded at the time of the call; nothing
//! is maintained incrementally. Sums are kept at full precision and only rounded when formatted.

use crate::context::CurrencyContext;
use crate::model::{Category, Currency, Money, MonthlyBudget, Period, Transaction};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// The id of the synthetic category that holds transactions without a (known) category.
pub const UNCATEGORIZED_ID: &str = "uncategorized";
pub const UNCATEGORIZED_NAME: &str = "Uncategorized";
pub const UNCATEGORIZED_COLOR: &str = "#9ca3af";

/// The collections a month's figures are built from.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Categories,
    Budgets,
    Transactions,
}

serde_plain::derive_display_from_serialize!(Resource);

/// The figures for one category, all in the display currency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryStats {
    pub id: String,
    pub name: String,
    pub color: String,
    pub budget: f64,
    pub spent: f64,
    /// `budget - spent`, never below zero.
    pub remaining: f64,
    /// `spent / budget * 100`, or 0 when there is no budget.
    pub percentage: f64,
    pub over_budget: bool,
    pub transaction_count: usize,
    /// Whether the budget can be changed. Comes from the server.
    pub is_editable: bool,
    pub is_deletable: bool,
    pub is_uncategorized: bool,
}

/// Spend per original currency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrencyTotal {
    pub currency: String,
    /// The sum in `currency` itself.
    pub amount: f64,
    /// The sum in the display currency, or `amount` unconverted when no rate is available.
    pub converted: f64,
    pub convertible: bool,
    pub transaction_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySpending {
    pub date: NaiveDate,
    pub amount: f64,
    pub transaction_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HighestSpender {
    pub id: String,
    pub name: String,
    pub spent: f64,
}

/// Everything shown for one month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthReport {
    pub period: Period,
    pub currency: Currency,
    /// Named categories in the order the server sent them, then the uncategorized bucket when it
    /// holds any transactions.
    pub categories: Vec<CategoryStats>,
    pub total_spent: f64,
    pub total_budget: f64,
    /// `total_budget - total_spent`, never below zero.
    pub remaining: f64,
    pub percentage_used: f64,
    pub transaction_count: usize,
    /// `None` when nothing was spent.
    pub highest_spender: Option<HighestSpender>,
    pub by_currency: Vec<CurrencyTotal>,
    pub daily_spending: Vec<DailySpending>,
    /// Currencies that could not be converted and were summed as-is.
    pub unconverted: Vec<String>,
    /// The rates are old, failed to refresh, or missing.
    pub rates_stale: bool,
    /// Collections that failed to load and should be retried. When non-empty the figures are
    /// partial.
    pub retry: Vec<Resource>,
}

impl MonthReport {
    pub fn is_partial(&self) -> bool {
        !self.retry.is_empty()
    }

    /// The highest spender's name, or `N/A` when nothing was spent.
    pub fn highest_spender_name(&self) -> &str {
        self.highest_spender
            .as_ref()
            .map(|h| h.name.as_str())
            .unwrap_or("N/A")
    }

    pub fn category(&self, id: &str) -> Option<&CategoryStats> {
        self.categories.iter().find(|c| c.id == id)
    }

    pub fn uncategorized(&self) -> Option<&CategoryStats> {
        self.categories.iter().find(|c| c.is_uncategorized)
    }
}

/// Spend for one month in a trend series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthTotal {
    pub period: Period,
    pub spent: f64,
    pub transaction_count: usize,
}

#[derive(Debug, Default)]
struct Tally {
    spent: f64,
    count: usize,
}

/// Builds the report for `period`.
///
/// When `transactions` is `None` (they failed to load) category spend falls back to the server's
/// `spentThisMonth` and the report asks for a transactions retry.
pub fn month_report(
    period: Period,
    categories: &[Category],
    budgets: &[MonthlyBudget],
    transactions: Option<&[Transaction]>,
    ctx: &CurrencyContext,
) -> MonthReport {
    let display = ctx.currency().as_str();
    let budgets_by_category: HashMap<&str, &MonthlyBudget> = budgets
        .iter()
        .map(|b| (b.category_id.as_str(), b))
        .collect();
    let known: BTreeSet<&str> = categories.iter().map(|c| c.id.as_str()).collect();
    for b in budgets {
        if !known.contains(b.category_id.as_str()) {
            debug!(
                "Ignoring budget for unknown category '{}' in {period}",
                b.category_id
            );
        }
    }

    let mut unconverted = BTreeSet::new();
    let mut note_unconverted = |money: &Money| {
        if !ctx.can_convert(&money.currency) {
            unconverted.insert(money.currency.clone());
        }
    };

    // Spend per category id, with unknown ids and missing ids under the uncategorized bucket.
    let mut tallies: HashMap<&str, Tally> = HashMap::new();
    let mut by_currency: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    let mut daily: BTreeMap<NaiveDate, Tally> = BTreeMap::new();
    let mut transaction_count = 0;

    let in_period: Vec<&Transaction> = transactions
        .unwrap_or_default()
        .iter()
        .filter(|t| period.contains(t.date))
        .collect();
    for t in &in_period {
        let money = t.amount.for_aggregation();
        note_unconverted(money);
        let converted = ctx.convert_money(money);

        let key = match t.category_id.as_deref() {
            Some(id) if known.contains(id) => id,
            _ => UNCATEGORIZED_ID,
        };
        let tally = tallies.entry(key).or_default();
        tally.spent += converted;
        tally.count += 1;

        let day = daily.entry(t.date).or_default();
        day.spent += converted;
        day.count += 1;

        let original = &t.amount.original;
        let entry = by_currency.entry(original.currency.clone()).or_default();
        entry.0 += original.value;
        entry.1 += 1;

        transaction_count += 1;
    }

    let mut stats = Vec::with_capacity(categories.len() + 1);
    for c in categories {
        let budget_row = budgets_by_category.get(c.id.as_str());
        let budget = budget_row
            .map(|b| ctx.convert_to(b.budget_amount, &b.currency, display))
            .unwrap_or(0.0);
        let (spent, count) = match (transactions, budget_row) {
            (Some(_), _) => tallies
                .get(c.id.as_str())
                .map(|t| (t.spent, t.count))
                .unwrap_or((0.0, 0)),
            (None, Some(b)) => {
                note_unconverted(&Money::new(b.spent_this_month, &b.currency));
                (
                    ctx.convert_to(b.spent_this_month, &b.currency, display),
                    0,
                )
            }
            (None, None) => (0.0, 0),
        };
        stats.push(CategoryStats {
            id: c.id.clone(),
            name: c.name.clone(),
            color: c.color.clone(),
            budget,
            spent,
            remaining: remaining(budget, spent),
            percentage: percentage(spent, budget),
            over_budget: budget > 0.0 && spent > budget,
            transaction_count: count,
            is_editable: budget_row.map(|b| b.is_editable).unwrap_or(false),
            is_deletable: true,
            is_uncategorized: false,
        });
    }

    if let Some(tally) = tallies.get(UNCATEGORIZED_ID) {
        stats.push(CategoryStats {
            id: UNCATEGORIZED_ID.to_string(),
            name: UNCATEGORIZED_NAME.to_string(),
            color: UNCATEGORIZED_COLOR.to_string(),
            budget: 0.0,
            spent: tally.spent,
            remaining: 0.0,
            percentage: 0.0,
            over_budget: false,
            transaction_count: tally.count,
            is_editable: false,
            is_deletable: false,
            is_uncategorized: true,
        });
    }

    let total_spent: f64 = stats.iter().map(|s| s.spent).sum();
    let total_budget: f64 = stats.iter().map(|s| s.budget).sum();

    let by_currency = by_currency
        .into_iter()
        .map(|(currency, (amount, count))| CurrencyTotal {
            converted: ctx.convert_to(amount, &currency, display),
            convertible: ctx.can_convert(&currency),
            currency,
            amount,
            transaction_count: count,
        })
        .collect();

    let daily_spending = daily
        .into_iter()
        .map(|(date, tally)| DailySpending {
            date,
            amount: tally.spent,
            transaction_count: tally.count,
        })
        .collect();

    MonthReport {
        period,
        currency: ctx.currency(),
        highest_spender: highest_spender(&stats),
        categories: stats,
        total_spent,
        total_budget,
        remaining: remaining(total_budget, total_spent),
        percentage_used: percentage(total_spent, total_budget),
        transaction_count,
        by_currency,
        daily_spending,
        unconverted: unconverted.into_iter().collect(),
        rates_stale: ctx.rates_stale(),
        retry: if transactions.is_none() {
            vec![Resource::Transactions]
        } else {
            Vec::new()
        },
    }
}

/// Spend per month for each of `periods`, in the order given.
pub fn monthly_totals(
    transactions: &[Transaction],
    periods: &[Period],
    ctx: &CurrencyContext,
) -> Vec<MonthTotal> {
    periods
        .iter()
        .map(|period| {
            let mut total = MonthTotal {
                period: *period,
                spent: 0.0,
                transaction_count: 0,
            };
            for t in transactions.iter().filter(|t| period.contains(t.date)) {
                total.spent += ctx.convert_money(t.amount.for_aggregation());
                total.transaction_count += 1;
            }
            total
        })
        .collect()
}

/// The first category with the largest spend. The uncategorized bucket only wins when it is
/// strictly larger than every named category.
fn highest_spender(stats: &[CategoryStats]) -> Option<HighestSpender> {
    let named = stats.iter().filter(|s| !s.is_uncategorized);
    let bucket = stats.iter().filter(|s| s.is_uncategorized);
    let mut best: Option<&CategoryStats> = None;
    for s in named.chain(bucket) {
        let current = best.map(|b| b.spent).unwrap_or(0.0);
        if s.spent > current {
            best = Some(s);
        }
    }
    best.map(|s| HighestSpender {
        id: s.id.clone(),
        name: s.name.clone(),
        spent: s.spent,
    })
}

fn remaining(budget: f64, spent: f64) -> f64 {
    (budget - spent).max(0.0)
}

fn percentage(spent: f64, budget: f64) -> f64 {
    if budget > 0.0 {
        spent / budget * 100.0
    } else {
        0.0
    }
}
