//! Filtering and aggregation of expense records.
//!
//! Every function here is pure and works on a snapshot slice, so views can
//! call them on demand without touching the cache or the store.
//!
//! Amounts are coerced to numbers here, at read time, with
//! [coerce_amount]. A record whose amount does not coerce contributes `NaN`,
//! which then shows up in every total it is part of instead of crashing the
//! view or being silently skipped.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::record::{Amount, ExpenseRecord};

/// Totals keyed by a bucket label (member name, month or day).
///
/// Labels iterate in lexical order, which for `YYYY-MM` and `YYYY-MM-DD`
/// labels is chronological.
pub type Totals = BTreeMap<String, f64>;

/// Selects records by member, month and day. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFilter {
    /// Only records with exactly this member name.
    pub name: Option<String>,
    /// Only records in this month bucket, `YYYY-MM`.
    pub month: Option<String>,
    /// Only records with exactly this date.
    pub day: Option<String>,
}

impl RecordFilter {
    /// Whether `record` passes every field of the filter that is set.
    pub fn matches(&self, record: &ExpenseRecord) -> bool {
        let name_matches = self.name.as_ref().is_none_or(|name| &record.name == name);
        let month_matches = self
            .month
            .as_ref()
            .is_none_or(|month| record.date.month() == month.as_str());
        let day_matches = self
            .day
            .as_ref()
            .is_none_or(|day| record.date.as_str() == day);

        name_matches && month_matches && day_matches
    }

    /// Treat blank fields as unset, e.g. `?name=` from an empty form field.
    pub fn without_blanks(self) -> Self {
        fn non_blank(value: Option<String>) -> Option<String> {
            value.filter(|value| !value.trim().is_empty())
        }

        Self {
            name: non_blank(self.name),
            month: non_blank(self.month),
            day: non_blank(self.day),
        }
    }
}

/// A labelled value in the shape charting libraries expect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    /// The category label, e.g. a member name or a month.
    pub label: String,
    /// The total for the label.
    pub value: f64,
}

/// Coerce a stored amount to a number.
///
/// Numbers are used as-is. Text is trimmed, blank text counts as zero and
/// anything that does not parse as a decimal number is `NaN`. A missing
/// amount is `NaN`.
pub fn coerce_amount(amount: &Amount) -> f64 {
    match amount {
        Amount::Number(number) => *number,
        Amount::Text(text) => {
            let text = text.trim();
            if text.is_empty() {
                0.0
            } else {
                text.parse().unwrap_or(f64::NAN)
            }
        }
        Amount::Missing => f64::NAN,
    }
}

/// The records that match `filter`, in snapshot order.
pub fn filter(records: &[ExpenseRecord], filter: &RecordFilter) -> Vec<ExpenseRecord> {
    records
        .iter()
        .filter(|record| filter.matches(record))
        .cloned()
        .collect()
}

/// The sum of all amounts.
pub fn total(records: &[ExpenseRecord]) -> f64 {
    records
        .iter()
        .map(|record| coerce_amount(&record.amount))
        .fold(0.0, |total, amount| total + amount)
}

/// Sums amounts by member name.
///
/// Names without records are absent rather than zero. Names that are not
/// household members still get their own entry.
pub fn sum_by_name(records: &[ExpenseRecord]) -> Totals {
    sum_by(records, |record| record.name.as_str())
}

/// Sums amounts by month (`YYYY-MM`).
///
/// Malformed dates are bucketed under whatever their first seven
/// characters are.
pub fn sum_by_month(records: &[ExpenseRecord]) -> Totals {
    sum_by(records, |record| record.date.month())
}

/// Sums amounts by day (`YYYY-MM-DD`), e.g. for a calendar view.
pub fn sum_by_day(records: &[ExpenseRecord]) -> Totals {
    sum_by(records, |record| record.date.as_str())
}

/// Sums amounts by month, then by member name within each month.
///
/// A month only lists the names that have at least one record in that month.
pub fn sum_by_month_and_name(records: &[ExpenseRecord]) -> BTreeMap<String, Totals> {
    let mut totals: BTreeMap<String, Totals> = BTreeMap::new();

    for record in records {
        *totals
            .entry(record.date.month().to_owned())
            .or_default()
            .entry(record.name.clone())
            .or_insert(0.0) += coerce_amount(&record.amount);
    }

    totals
}

/// Converts totals into chart points, in label order.
pub fn to_chart_series(totals: &Totals) -> Vec<ChartPoint> {
    totals
        .iter()
        .map(|(label, value)| ChartPoint {
            label: label.clone(),
            value: *value,
        })
        .collect()
}

/// Reorders `series` so household members come first, in `members` order.
///
/// Labels that are not members keep their lexical order after the members.
pub fn order_by_members(mut series: Vec<ChartPoint>, members: &[String]) -> Vec<ChartPoint> {
    series.sort_by_cached_key(|point| {
        let position = members
            .iter()
            .position(|member| member == &point.label)
            .unwrap_or(members.len());

        (position, point.label.clone())
    });

    series
}

fn sum_by<'a>(records: &'a [ExpenseRecord], key: impl Fn(&'a ExpenseRecord) -> &'a str) -> Totals {
    let mut totals = Totals::new();

    for record in records {
        *totals.entry(key(record).to_owned()).or_insert(0.0) += coerce_amount(&record.amount);
    }

    totals
}
