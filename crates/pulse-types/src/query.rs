//! A small query-descriptor language for the `feedbacks` table.
//!
//! The dashboard composes these from user filters and the row store turns
//! them into SQL. Columns are a closed enum so a descriptor can never name
//! anything the store does not expose. Owner scoping is NOT part of the
//! descriptor: the store always adds it from the authenticated caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    SenderEmail,
    SenderName,
    Subject,
    Summary,
    AverageRating,
    ReceivedAt,
    ProcessedAt,
}

impl Column {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::SenderEmail => "sender_email",
            Self::SenderName => "sender_name",
            Self::Subject => "subject",
            Self::Summary => "summary",
            Self::AverageRating => "average_rating",
            Self::ReceivedAt => "received_at",
            Self::ProcessedAt => "processed_at",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    Number(f64),
    Timestamp(DateTime<Utc>),
}

/// Case folding used for every `Contains` comparison, on the client and in
/// the store alike, so both sides agree on non-ASCII text.
pub fn fold_case(text: &str) -> String {
    text.to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Predicate {
    /// Case-insensitive substring match; true if ANY listed column matches.
    Contains { columns: Vec<Column>, needle: String },
    /// `column >= value` (inclusive lower bound)
    Gte { column: Column, value: Value },
    /// `column < value` (exclusive upper bound)
    Lt { column: Column, value: Value },
    IsNull { column: Column },
    NotNull { column: Column },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: Column,
    pub ascending: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub offset: u64,
    pub limit: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeedbackQuery {
    #[serde(default)]
    pub predicates: Vec<Predicate>,
    #[serde(default)]
    pub order: Option<OrderBy>,
    #[serde(default)]
    pub range: Option<Range>,
    /// Ask the store for the exact number of matching rows (ignores `range`).
    #[serde(default)]
    pub count: bool,
}

impl FeedbackQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn order_by(mut self, column: Column, ascending: bool) -> Self {
        self.order = Some(OrderBy { column, ascending });
        self
    }

    pub fn range(mut self, offset: u64, limit: u64) -> Self {
        self.range = Some(Range { offset, limit });
        self
    }

    pub fn with_count(mut self) -> Self {
        self.count = true;
        self
    }

    /// True when at least one predicate narrows the result set.
    pub fn is_filtered(&self) -> bool {
        !self.predicates.is_empty()
    }
}
