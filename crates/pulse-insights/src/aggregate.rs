//! View-model builders for the dashboard screens.
//!
//! Every function here is pure: it borrows its input, never mutates it, and
//! returns the same output for the same input. Outputs are ordered
//! explicitly (day, hour, star, count) so repeated calls are bit-identical.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

use pulse_types::models::{Feedback, Issue};

use crate::filter::RatingBand;

pub const POSITIVE_FROM: f64 = 4.0;
pub const NEUTRAL_FROM: f64 = 2.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn classify(rating: f64) -> Self {
        if rating >= POSITIVE_FROM {
            Self::Positive
        } else if rating >= NEUTRAL_FROM {
            Self::Neutral
        } else {
            Self::Negative
        }
    }

    /// `None` for unrated feedback. A stored rating of 0 is Negative.
    pub fn of(feedback: &Feedback) -> Option<Self> {
        feedback.average_rating.map(Self::classify)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SentimentBreakdown {
    pub positive: usize,
    pub neutral: usize,
    pub negative: usize,
}

impl SentimentBreakdown {
    pub fn total(&self) -> usize {
        self.positive + self.neutral + self.negative
    }

    pub fn count(&self, sentiment: Sentiment) -> usize {
        match sentiment {
            Sentiment::Positive => self.positive,
            Sentiment::Neutral => self.neutral,
            Sentiment::Negative => self.negative,
        }
    }

    /// Share of rated feedback in `sentiment`, 0..=100. Zero when nothing is rated.
    pub fn percent(&self, sentiment: Sentiment) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.count(sentiment) as f64 * 100.0 / total as f64
    }
}

pub fn sentiment_distribution(rows: &[Feedback]) -> SentimentBreakdown {
    let mut out = SentimentBreakdown::default();
    for sentiment in rows.iter().filter_map(Sentiment::of) {
        match sentiment {
            Sentiment::Positive => out.positive += 1,
            Sentiment::Neutral => out.neutral += 1,
            Sentiment::Negative => out.negative += 1,
        }
    }
    out
}

/// Mean of the present ratings; 0 when there are none.
pub fn average_rating(rows: &[Feedback]) -> f64 {
    mean(rows.iter().filter_map(|f| f.average_rating))
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingBucket {
    pub stars: u8,
    pub count: usize,
}

/// Count of rated feedback per star band, 1 through 5, using the same band
/// edges as the rating filter.
pub fn rating_histogram(rows: &[Feedback]) -> Vec<RatingBucket> {
    let mut counts = [0usize; 5];
    for rating in rows.iter().filter_map(|f| f.average_rating) {
        counts[usize::from(RatingBand::classify(rating).stars()) - 1] += 1;
    }
    RatingBand::ALL
        .iter()
        .zip(counts)
        .map(|(band, count)| RatingBucket { stars: band.stars(), count })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DayBucket {
    pub date: NaiveDate,
    pub count: usize,
    pub average_rating: f64,
}

/// One bucket per local calendar day, `days` of them ending at `today`,
/// oldest first. Days without feedback are present with zero counts.
pub fn daily_series<Tz: TimeZone>(rows: &[Feedback], tz: &Tz, today: NaiveDate, days: u32) -> Vec<DayBucket> {
    if days == 0 {
        return Vec::new();
    }
    let start = today - chrono::TimeDelta::days(i64::from(days) - 1);

    let mut per_day: BTreeMap<NaiveDate, (usize, Vec<f64>)> = BTreeMap::new();
    for f in rows {
        let date = f.received_at.with_timezone(tz).date_naive();
        if date < start || date > today {
            continue;
        }
        let entry = per_day.entry(date).or_default();
        entry.0 += 1;
        if let Some(rating) = f.average_rating {
            entry.1.push(rating);
        }
    }

    start
        .iter_days()
        .take(days as usize)
        .map(|date| match per_day.get(&date) {
            Some((count, ratings)) => DayBucket {
                date,
                count: *count,
                average_rating: mean(ratings.iter().copied()),
            },
            None => DayBucket { date, count: 0, average_rating: 0.0 },
        })
        .collect()
}

/// The seven days ending at `today`.
pub fn weekly_series<Tz: TimeZone>(rows: &[Feedback], tz: &Tz, today: NaiveDate) -> Vec<DayBucket> {
    daily_series(rows, tz, today, 7)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourBucket {
    pub hour: u32,
    pub count: usize,
}

/// Always 24 buckets, hour-of-day in the viewer's zone.
pub fn hourly_distribution<Tz: TimeZone>(rows: &[Feedback], tz: &Tz) -> Vec<HourBucket> {
    let mut counts = [0usize; 24];
    for f in rows {
        counts[f.received_at.with_timezone(tz).hour() as usize] += 1;
    }
    (0u32..)
        .zip(counts)
        .map(|(hour, count)| HourBucket { hour, count })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueFrequency {
    pub title: String,
    pub count: usize,
}

/// Most frequent issue titles. Titles match exactly (case-sensitive); ties
/// keep first-seen order.
pub fn top_issues(issues: &[Issue], n: usize) -> Vec<IssueFrequency> {
    let mut order: Vec<IssueFrequency> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for issue in issues {
        match index.get(issue.issue_title.as_str()) {
            Some(&i) => order[i].count += 1,
            None => {
                index.insert(issue.issue_title.as_str(), order.len());
                order.push(IssueFrequency { title: issue.issue_title.clone(), count: 1 });
            }
        }
    }

    // sort_by is stable, so equal counts stay in arrival order
    order.sort_by(|a, b| b.count.cmp(&a.count));
    order.truncate(n);
    order
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardOverview {
    pub total: usize,
    pub unread: usize,
    pub processed: usize,
    pub average_rating: f64,
    pub sentiment: SentimentBreakdown,
    pub histogram: Vec<RatingBucket>,
    pub weekly: Vec<DayBucket>,
    pub hourly: Vec<HourBucket>,
    pub top_issues: Vec<IssueFrequency>,
}

pub const TOP_ISSUES: usize = 5;

/// Everything the overview screen draws, computed in one pass per chart.
pub fn overview<Tz: TimeZone>(
    feedback: &[Feedback],
    issues: &[Issue],
    tz: &Tz,
    now: DateTime<Utc>,
) -> DashboardOverview {
    let processed = feedback.iter().filter(|f| f.is_processed()).count();
    let today = now.with_timezone(tz).date_naive();

    DashboardOverview {
        total: feedback.len(),
        unread: feedback.len() - processed,
        processed,
        average_rating: round_to(average_rating(feedback), 1),
        sentiment: sentiment_distribution(feedback),
        histogram: rating_histogram(feedback),
        weekly: weekly_series(feedback, tz, today),
        hourly: hourly_distribution(feedback, tz),
        top_issues: top_issues(issues, TOP_ISSUES),
    }
}
