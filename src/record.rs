//! Defines the expense record model and the decoding step for untyped store rows.

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use time::{Date, format_description::BorrowedFormatItem, macros::format_description};

use crate::{Error, LedgerConfig, aggregation::coerce_amount};

/// The format of a [RecordDate], e.g. "2024-03-15".
const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

// ============================================================================
// MODELS
// ============================================================================

/// The opaque identifier the record store assigns to a record.
///
/// IDs are never reused, so an ID refers to at most one record for the
/// lifetime of the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Wrap a store-assigned identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The calendar date of a record as a local-time `YYYY-MM-DD` string.
///
/// The string form is kept as-is, even when it is malformed, because month
/// and day buckets are derived from it by prefix and equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordDate(String);

impl RecordDate {
    /// Wrap a date string without checking it.
    pub fn new(date: impl Into<String>) -> Self {
        Self(date.into())
    }

    /// Format `date` as `YYYY-MM-DD`.
    pub fn from_date(date: Date) -> Self {
        Self(format!(
            "{:04}-{:02}-{:02}",
            date.year(),
            u8::from(date.month()),
            date.day()
        ))
    }

    /// The full date string, which is also the day bucket.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The month bucket, i.e. the first seven characters (`YYYY-MM`).
    ///
    /// Shorter strings are returned whole.
    pub fn month(&self) -> &str {
        match self.0.char_indices().nth(7) {
            Some((end, _)) => &self.0[..end],
            None => &self.0,
        }
    }

    /// Parse the string as a calendar date, `None` if it is not a valid `YYYY-MM-DD` date.
    pub fn parse(&self) -> Option<Date> {
        Date::parse(&self.0, DATE_FORMAT).ok()
    }
}

impl Display for RecordDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The amount of money spent, as persisted by the store.
///
/// Stores may persist the amount untyped, so it is kept in its stored form
/// and only coerced to a number when aggregating (see
/// [coerce_amount](crate::aggregation::coerce_amount)).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Amount {
    /// A numeric amount.
    Number(f64),
    /// An amount stored as text, e.g. straight from a form field.
    Text(String),
    /// No amount was stored.
    #[default]
    Missing,
}

impl Amount {
    /// Read an amount typed by a person or found in a file.
    ///
    /// Blank input is [Amount::Missing]. Input that parses as a number once
    /// thousands separators are removed is [Amount::Number], anything else is
    /// kept as [Amount::Text].
    pub fn from_input(text: &str) -> Self {
        let text = text.trim();

        if text.is_empty() {
            return Amount::Missing;
        }

        match text.replace(',', "").parse::<f64>() {
            Ok(number) => Amount::Number(number),
            Err(_) => Amount::Text(text.to_owned()),
        }
    }
}

impl From<f64> for Amount {
    fn from(value: f64) -> Self {
        Amount::Number(value)
    }
}

impl From<i32> for Amount {
    fn from(value: i32) -> Self {
        Amount::Number(value.into())
    }
}

impl From<i64> for Amount {
    fn from(value: i64) -> Self {
        Amount::Number(value as f64)
    }
}

impl From<&str> for Amount {
    fn from(value: &str) -> Self {
        Amount::Text(value.to_owned())
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Amount::Number(number) => write!(f, "{number}"),
            Amount::Text(text) => write!(f, "{text}"),
            Amount::Missing => Ok(()),
        }
    }
}

/// One expense: who spent how much, on what, and when.
///
/// To create a new `ExpenseRecord`, use [ExpenseRecord::build] and submit
/// the draft through a [RecordCache](crate::RecordCache).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseRecord {
    /// The ID assigned by the store.
    pub id: RecordId,
    /// The household member who spent the money.
    pub name: String,
    /// When the money was spent.
    pub date: RecordDate,
    /// What the money was spent on.
    pub item: String,
    /// How much was spent.
    pub amount: Amount,
}

impl ExpenseRecord {
    /// Create a new draft.
    ///
    /// Shortcut for [RecordDraft] for discoverability.
    pub fn build(name: &str, date: &str, item: &str, amount: impl Into<Amount>) -> RecordDraft {
        RecordDraft {
            id: None,
            name: name.to_owned(),
            date: RecordDate::new(date),
            item: item.to_owned(),
            amount: amount.into(),
        }
    }

    /// Combine a store-assigned `id` with the fields of `draft`.
    ///
    /// Any ID on the draft is ignored.
    pub fn from_draft(id: RecordId, draft: RecordDraft) -> Self {
        Self {
            id,
            name: draft.name,
            date: draft.date,
            item: draft.item,
            amount: draft.amount,
        }
    }

    /// A draft that replaces this record when submitted.
    pub fn to_draft(&self) -> RecordDraft {
        RecordDraft {
            id: Some(self.id.clone()),
            name: self.name.clone(),
            date: self.date.clone(),
            item: self.item.clone(),
            amount: self.amount.clone(),
        }
    }
}

/// A record payload submitted by the UI.
///
/// Without an ID the draft creates a new record, with an ID it replaces
/// every field of that record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordDraft {
    /// The record to replace, or `None` to create a new record.
    #[serde(default)]
    pub id: Option<RecordId>,
    /// The household member who spent the money.
    pub name: String,
    /// When the money was spent, as `YYYY-MM-DD`.
    pub date: RecordDate,
    /// What the money was spent on.
    pub item: String,
    /// How much was spent.
    #[serde(default)]
    pub amount: Amount,
}

impl RecordDraft {
    /// Set the ID of the record this draft replaces.
    pub fn id(mut self, id: Option<RecordId>) -> Self {
        self.id = id;
        self
    }

    /// Check the draft before it is sent to the store.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::UnknownMember] if `name` is not a member of the household in `config`,
    /// - [Error::InvalidDate] if `date` is not a valid `YYYY-MM-DD` date,
    /// - [Error::EmptyItem] if `item` is blank,
    /// - or [Error::InvalidAmount] if `amount` does not coerce to a finite number.
    pub fn validate(&self, config: &LedgerConfig) -> Result<(), Error> {
        if !config.is_member(&self.name) {
            return Err(Error::UnknownMember(self.name.clone()));
        }

        if self.date.parse().is_none() {
            return Err(Error::InvalidDate(self.date.to_string()));
        }

        if self.item.trim().is_empty() {
            return Err(Error::EmptyItem);
        }

        if !coerce_amount(&self.amount).is_finite() {
            return Err(Error::InvalidAmount(self.amount.to_string()));
        }

        Ok(())
    }
}

// ============================================================================
// STORE BOUNDARY
// ============================================================================

/// A record as it comes out of a store, before any checks.
///
/// Every field is optional because other writers are not bound by this
/// crate's validation.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawRecord {
    /// The store's identifier for the row.
    pub id: Option<String>,
    /// The member name.
    pub name: Option<String>,
    /// The date string.
    pub date: Option<String>,
    /// The item description.
    pub item: Option<String>,
    /// The untyped amount.
    #[serde(default)]
    pub amount: Amount,
}

impl RawRecord {
    /// Turn a raw row into an [ExpenseRecord].
    ///
    /// Text fields are trimmed and missing text fields become empty
    /// strings. Malformed dates and amounts are kept so they show up in
    /// aggregates instead of silently disappearing. Returns `None` for rows
    /// without an ID, since they cannot be updated or deleted.
    pub fn decode(self) -> Option<ExpenseRecord> {
        let id = self
            .id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_owned);
        let Some(id) = id else {
            tracing::warn!("Dropping record without an ID: {self:?}");
            return None;
        };

        let date = RecordDate::new(self.date.unwrap_or_default().trim());
        if date.parse().is_none() {
            tracing::warn!("Record {id} has a malformed date {date:?}");
        }

        let amount = match self.amount {
            Amount::Text(text) => Amount::Text(text.trim().to_owned()),
            amount => amount,
        };

        Some(ExpenseRecord {
            id: RecordId(id),
            name: self.name.unwrap_or_default().trim().to_owned(),
            date,
            item: self.item.unwrap_or_default().trim().to_owned(),
            amount,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
