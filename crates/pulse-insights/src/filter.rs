use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Months, NaiveTime, TimeDelta, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use pulse_types::models::Feedback;
use pulse_types::query::{Column, FeedbackQuery, Predicate, Value, fold_case};

/// Columns searched by the free-text box.
pub const TEXT_COLUMNS: [Column; 4] = [
    Column::Subject,
    Column::Summary,
    Column::SenderName,
    Column::SenderEmail,
];

/// Columns searched by the sender box.
pub const SENDER_COLUMNS: [Column; 2] = [Column::SenderEmail, Column::SenderName];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    #[error("unknown rating selector '{0}'")]
    Rating(String),
    #[error("unknown date range '{0}'")]
    DateRange(String),
    #[error("unknown sort field '{0}'")]
    SortField(String),
}

/// Star band picked from the rating dropdown.
///
/// Bands are half-open and deliberately not centred on the integers:
/// `5` = [4.5, ∞), `4` = [3.5, 4.5), `3` = [2.5, 3.5), `2` = [1.5, 2.5),
/// `1` = (−∞, 1.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RatingBand {
    One,
    Two,
    Three,
    Four,
    Five,
}

impl RatingBand {
    pub const ALL: [RatingBand; 5] = [Self::One, Self::Two, Self::Three, Self::Four, Self::Five];

    /// (inclusive lower, exclusive upper); `None` means unbounded.
    pub fn bounds(&self) -> (Option<f64>, Option<f64>) {
        match self {
            Self::Five => (Some(4.5), None),
            Self::Four => (Some(3.5), Some(4.5)),
            Self::Three => (Some(2.5), Some(3.5)),
            Self::Two => (Some(1.5), Some(2.5)),
            Self::One => (None, Some(1.5)),
        }
    }

    pub fn contains(&self, rating: f64) -> bool {
        let (lo, hi) = self.bounds();
        lo.is_none_or(|lo| rating >= lo) && hi.is_none_or(|hi| rating < hi)
    }

    /// The band a rating falls into. Every finite rating has exactly one.
    pub fn classify(rating: f64) -> Self {
        Self::ALL
            .into_iter()
            .rev()
            .find(|band| band.contains(rating))
            .unwrap_or(Self::One)
    }

    pub fn stars(&self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Three => 3,
            Self::Four => 4,
            Self::Five => 5,
        }
    }
}

impl FromStr for RatingBand {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" => Ok(Self::One),
            "2" => Ok(Self::Two),
            "3" => Ok(Self::Three),
            "4" => Ok(Self::Four),
            "5" => Ok(Self::Five),
            other => Err(SelectorError::Rating(other.to_string())),
        }
    }
}

/// Rating dropdown value. Serialized as `"all"` or `"1"`..`"5"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RatingFilter {
    #[default]
    All,
    Band(RatingBand),
}

impl FromStr for RatingFilter {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(Self::All)
        } else {
            s.parse().map(Self::Band)
        }
    }
}

impl TryFrom<String> for RatingFilter {
    type Error = SelectorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RatingFilter> for String {
    fn from(value: RatingFilter) -> Self {
        value.to_string()
    }
}

impl fmt::Display for RatingFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Band(band) => write!(f, "{}", band.stars()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateRange {
    #[default]
    All,
    Today,
    Week,
    Month,
    Quarter,
    Year,
}

impl DateRange {
    /// Lower bound relative to `now`. There is never an upper bound.
    pub fn start<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<DateTime<Utc>> {
        let start = match self {
            Self::All => return None,
            Self::Today => {
                let midnight = now.date_naive().and_time(NaiveTime::MIN);
                now.timezone()
                    .from_local_datetime(&midnight)
                    .earliest()
                    // Midnight skipped by a DST jump: fall back to 24h ago.
                    .unwrap_or_else(|| now.clone() - TimeDelta::days(1))
            }
            Self::Week => now.clone() - TimeDelta::days(7),
            Self::Month => sub_months(now, 1),
            Self::Quarter => sub_months(now, 3),
            Self::Year => sub_months(now, 12),
        };
        Some(start.with_timezone(&Utc))
    }
}

fn sub_months<Tz: TimeZone>(now: &DateTime<Tz>, months: u32) -> DateTime<Tz> {
    now.clone()
        .checked_sub_months(Months::new(months))
        .unwrap_or_else(|| now.clone() - TimeDelta::days(30 * i64::from(months)))
}

impl FromStr for DateRange {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "today" => Ok(Self::Today),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "quarter" => Ok(Self::Quarter),
            "year" => Ok(Self::Year),
            other => Err(SelectorError::DateRange(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    ReceivedAt,
    Rating,
    Sender,
    Subject,
}

impl SortField {
    pub fn column(&self) -> Column {
        match self {
            Self::ReceivedAt => Column::ReceivedAt,
            Self::Rating => Column::AverageRating,
            Self::Sender => Column::SenderEmail,
            Self::Subject => Column::Subject,
        }
    }
}

impl FromStr for SortField {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "received_at" | "date" => Ok(Self::ReceivedAt),
            "rating" | "average_rating" => Ok(Self::Rating),
            "sender" | "sender_email" => Ok(Self::Sender),
            "subject" => Ok(Self::Subject),
            other => Err(SelectorError::SortField(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// Everything the feedback list's filter bar holds.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterState {
    pub query: String,
    pub rating: RatingFilter,
    pub date_range: DateRange,
    pub sender: String,
    pub sort: SortField,
    pub direction: SortDirection,
}

impl FilterState {
    /// No narrowing filter is set. Sort order does not count.
    pub fn is_idle(&self) -> bool {
        self.query.trim().is_empty()
            && self.sender.trim().is_empty()
            && self.rating == RatingFilter::All
            && self.date_range == DateRange::All
    }

    /// Build the store descriptor for this state, evaluating relative dates
    /// against `now`. Range and count are left to the caller.
    pub fn compose<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> FeedbackQuery {
        let mut query = FeedbackQuery::new().order_by(
            self.sort.column(),
            self.direction == SortDirection::Asc,
        );

        let text = self.query.trim();
        if !text.is_empty() {
            query = query.filter(Predicate::Contains {
                columns: TEXT_COLUMNS.to_vec(),
                needle: text.to_string(),
            });
        }

        if let RatingFilter::Band(band) = self.rating {
            let (lo, hi) = band.bounds();
            if let Some(lo) = lo {
                query = query.filter(Predicate::Gte {
                    column: Column::AverageRating,
                    value: Value::Number(lo),
                });
            }
            if let Some(hi) = hi {
                query = query.filter(Predicate::Lt {
                    column: Column::AverageRating,
                    value: Value::Number(hi),
                });
            }
        }

        if let Some(start) = self.date_range.start(now) {
            query = query.filter(Predicate::Gte {
                column: Column::ReceivedAt,
                value: Value::Timestamp(start),
            });
        }

        let sender = self.sender.trim();
        if !sender.is_empty() {
            query = query.filter(Predicate::Contains {
                columns: SENDER_COLUMNS.to_vec(),
                needle: sender.to_string(),
            });
        }

        query
    }

    /// In-memory evaluation with the same semantics as `compose`, used to
    /// decide whether a pushed row belongs in the current view.
    pub fn matches<Tz: TimeZone>(&self, feedback: &Feedback, now: &DateTime<Tz>) -> bool {
        let text = self.query.trim();
        if !text.is_empty() {
            let hit = contains_ci(feedback.subject.as_deref(), text)
                || contains_ci(feedback.summary.as_deref(), text)
                || contains_ci(feedback.sender_name.as_deref(), text)
                || contains_ci(Some(&feedback.sender_email), text);
            if !hit {
                return false;
            }
        }

        if let RatingFilter::Band(band) = self.rating {
            match feedback.average_rating {
                Some(rating) if band.contains(rating) => {}
                _ => return false,
            }
        }

        if let Some(start) = self.date_range.start(now) {
            if feedback.received_at < start {
                return false;
            }
        }

        let sender = self.sender.trim();
        if !sender.is_empty()
            && !contains_ci(Some(&feedback.sender_email), sender)
            && !contains_ci(feedback.sender_name.as_deref(), sender)
        {
            return false;
        }

        true
    }
}

fn contains_ci(haystack: Option<&str>, needle: &str) -> bool {
    haystack.is_some_and(|h| fold_case(h).contains(&fold_case(needle)))
}
