use anyhow::Result;
use chrono::{DateTime, Utc};
use pulse_types::query::{FeedbackQuery, Predicate, Value, fold_case};
use rusqlite::Row;
use rusqlite::types::Value as SqlValue;

use crate::models::FeedbackRow;
use crate::queries::OptionalExt;
use crate::{Database, format_ts};

const FEEDBACK_COLUMNS: &str = "id, user_id, username, sender_email, sender_name, subject, raw_json, \
     average_rating, summary, processed_at, received_at";

/// Hard cap on rows per read regardless of what the descriptor asks for.
pub const MAX_PAGE_SIZE: u64 = 500;

impl Database {
    pub fn insert_feedback(&self, row: &FeedbackRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO feedbacks ({FEEDBACK_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
                ),
                rusqlite::params![
                    row.id,
                    row.user_id,
                    row.username,
                    row.sender_email,
                    row.sender_name,
                    row.subject,
                    row.raw_json,
                    row.average_rating,
                    row.summary,
                    row.processed_at,
                    row.received_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_feedback(&self, owner_id: &str, id: &str) -> Result<Option<FeedbackRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {FEEDBACK_COLUMNS} FROM feedbacks WHERE id = ?1 AND user_id = ?2");
            let row = conn.query_row(&sql, [id, owner_id], map_feedback).optional()?;
            Ok(row)
        })
    }

    /// Run a descriptor against the caller's rows. Returns the page and, when
    /// `query.count` is set, the exact number of matches ignoring the range.
    pub fn query_feedbacks(
        &self,
        owner_id: &str,
        query: &FeedbackQuery,
    ) -> Result<(Vec<FeedbackRow>, Option<u64>)> {
        let (where_sql, params) = build_where(owner_id, query);

        let order_sql = match query.order {
            Some(order) => format!(
                "ORDER BY {} {} NULLS LAST, rowid DESC",
                order.column.as_sql(),
                if order.ascending { "ASC" } else { "DESC" }
            ),
            None => "ORDER BY received_at DESC, rowid DESC".to_string(),
        };
        let (limit, offset) = match query.range {
            Some(range) => (range.limit.min(MAX_PAGE_SIZE), range.offset),
            None => (MAX_PAGE_SIZE, 0),
        };

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {FEEDBACK_COLUMNS} FROM feedbacks {where_sql} {order_sql} LIMIT {limit} OFFSET {offset}"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(params.iter()), map_feedback)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let count = if query.count {
                let sql = format!("SELECT COUNT(*) FROM feedbacks {where_sql}");
                let n: i64 = conn.query_row(&sql, rusqlite::params_from_iter(params.iter()), |row| {
                    row.get(0)
                })?;
                Some(n.max(0) as u64)
            } else {
                None
            };

            Ok((rows, count))
        })
    }

    /// One-way transition to processed. Already-processed rows are returned
    /// untouched; `None` means the row does not exist for this owner.
    pub fn mark_processed(&self, owner_id: &str, id: &str, now: DateTime<Utc>) -> Result<Option<FeedbackRow>> {
        let now = format_ts(now);
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE feedbacks SET processed_at = ?3
                 WHERE id = ?1 AND user_id = ?2 AND processed_at IS NULL",
                (id, owner_id, &now),
            )?;
            let sql = format!("SELECT {FEEDBACK_COLUMNS} FROM feedbacks WHERE id = ?1 AND user_id = ?2");
            let row = conn.query_row(&sql, [id, owner_id], map_feedback).optional()?;
            Ok(row)
        })
    }

    pub fn delete_feedback(&self, owner_id: &str, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM feedbacks WHERE id = ?1 AND user_id = ?2", [id, owner_id])?;
            Ok(n > 0)
        })
    }
}

/// Translate predicates to a WHERE clause. Column names come from the closed
/// `Column` enum; every value goes through a bound parameter.
fn build_where(owner_id: &str, query: &FeedbackQuery) -> (String, Vec<SqlValue>) {
    let mut clauses = vec!["user_id = ?".to_string()];
    let mut params = vec![SqlValue::Text(owner_id.to_string())];

    for predicate in &query.predicates {
        match predicate {
            Predicate::Contains { columns, needle } => {
                if columns.is_empty() {
                    continue;
                }
                let pattern = format!("%{}%", escape_like(&fold_case(needle)));
                let any: Vec<String> = columns
                    .iter()
                    .map(|c| {
                        params.push(SqlValue::Text(pattern.clone()));
                        format!("fold_case({}) LIKE ? ESCAPE '\\'", c.as_sql())
                    })
                    .collect();
                clauses.push(format!("({})", any.join(" OR ")));
            }
            Predicate::Gte { column, value } => {
                clauses.push(format!("{} >= ?", column.as_sql()));
                params.push(sql_value(value));
            }
            Predicate::Lt { column, value } => {
                clauses.push(format!("{} < ?", column.as_sql()));
                params.push(sql_value(value));
            }
            Predicate::IsNull { column } => clauses.push(format!("{} IS NULL", column.as_sql())),
            Predicate::NotNull { column } => clauses.push(format!("{} IS NOT NULL", column.as_sql())),
        }
    }

    (format!("WHERE {}", clauses.join(" AND ")), params)
}

fn sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Number(n) => SqlValue::Real(*n),
        Value::Timestamp(ts) => SqlValue::Text(format_ts(*ts)),
    }
}

/// Both sides are folded before LIKE sees them; only the wildcards need escaping.
fn escape_like(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len());
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn map_feedback(row: &Row<'_>) -> rusqlite::Result<FeedbackRow> {
    Ok(FeedbackRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        username: row.get(2)?,
        sender_email: row.get(3)?,
        sender_name: row.get(4)?,
        subject: row.get(5)?,
        raw_json: row.get(6)?,
        average_rating: row.get(7)?,
        summary: row.get(8)?,
        processed_at: row.get(9)?,
        received_at: row.get(10)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use pulse_types::query::Column;

    fn seed(db: &Database) {
        db.create_user("u1", "dana", "dana@example.com", "hash", Utc::now()).unwrap();
        db.create_user("u2", "robin", "robin@example.com", "hash", Utc::now()).unwrap();
    }

    fn feedback(id: &str, owner: &str, rating: Option<f64>, subject: &str, received: DateTime<Utc>) -> FeedbackRow {
        FeedbackRow {
            id: id.into(),
            user_id: owner.into(),
            username: "dana".into(),
            sender_email: format!("{id}@customer.io"),
            sender_name: Some(format!("Sender {id}")),
            subject: Some(subject.into()),
            raw_json: "{}".into(),
            average_rating: rating,
            summary: None,
            processed_at: None,
            received_at: format_ts(received),
        }
    }

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_reads_are_owner_scoped() {
        let db = Database::open_in_memory().unwrap();
        seed(&db);
        db.insert_feedback(&feedback("a", "u1", Some(4.0), "Great", base())).unwrap();
        db.insert_feedback(&feedback("b", "u2", Some(1.0), "Bad", base())).unwrap();

        let (rows, count) = db.query_feedbacks("u1", &FeedbackQuery::new().with_count()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "a");
        assert_eq!(count, Some(1));
        assert!(db.get_feedback("u2", "a").unwrap().is_none());
        assert!(!db.delete_feedback("u2", "a").unwrap());
    }

    #[test]
    fn test_half_open_rating_band() {
        let db = Database::open_in_memory().unwrap();
        seed(&db);
        for (i, r) in [2.4, 2.5, 3.4, 3.5].iter().enumerate() {
            db.insert_feedback(&feedback(&format!("f{i}"), "u1", Some(*r), "x", base())).unwrap();
        }
        db.insert_feedback(&feedback("unrated", "u1", None, "x", base())).unwrap();

        let query = FeedbackQuery::new()
            .filter(Predicate::Gte { column: Column::AverageRating, value: Value::Number(2.5) })
            .filter(Predicate::Lt { column: Column::AverageRating, value: Value::Number(3.5) })
            .order_by(Column::AverageRating, true);
        let (rows, _) = db.query_feedbacks("u1", &query).unwrap();
        let ratings: Vec<f64> = rows.iter().filter_map(|r| r.average_rating).collect();
        assert_eq!(ratings, vec![2.5, 3.4]);
    }

    #[test]
    fn test_contains_is_case_insensitive_and_escaped() {
        let db = Database::open_in_memory().unwrap();
        seed(&db);
        db.insert_feedback(&feedback("a", "u1", None, "Checkout BROKEN", base())).unwrap();
        db.insert_feedback(&feedback("b", "u1", None, "100% happy", base())).unwrap();
        db.insert_feedback(&feedback("c", "u1", None, "1000 happy", base())).unwrap();

        let q = |needle: &str| {
            FeedbackQuery::new().filter(Predicate::Contains {
                columns: vec![Column::Subject, Column::Summary],
                needle: needle.into(),
            })
        };
        let (rows, _) = db.query_feedbacks("u1", &q("broken")).unwrap();
        assert_eq!(rows.len(), 1);
        let (rows, _) = db.query_feedbacks("u1", &q("100%")).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "b");
    }

    #[test]
    fn test_contains_folds_non_ascii_case() {
        let db = Database::open_in_memory().unwrap();
        seed(&db);
        db.insert_feedback(&feedback("a", "u1", None, "Ärger mit Überweisung", base())).unwrap();
        db.insert_feedback(&feedback("b", "u1", None, "Alles gut", base())).unwrap();

        let q = |needle: &str| {
            FeedbackQuery::new().filter(Predicate::Contains {
                columns: vec![Column::Subject],
                needle: needle.into(),
            })
        };
        for needle in ["ärger", "ÜBERWEISUNG", "Ärger"] {
            let (rows, _) = db.query_feedbacks("u1", &q(needle)).unwrap();
            let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
            assert_eq!(ids, vec!["a"], "needle {needle}");
        }
    }

    #[test]
    fn test_date_lower_bound_and_paging() {
        let db = Database::open_in_memory().unwrap();
        seed(&db);
        for i in 0..25 {
            let received = base() - Duration::days(i);
            db.insert_feedback(&feedback(&format!("f{i:02}"), "u1", None, "x", received)).unwrap();
        }

        let query = FeedbackQuery::new()
            .filter(Predicate::Gte {
                column: Column::ReceivedAt,
                value: Value::Timestamp(base() - Duration::days(7)),
            })
            .order_by(Column::ReceivedAt, false)
            .range(5, 5)
            .with_count();
        let (rows, count) = db.query_feedbacks("u1", &query).unwrap();
        assert_eq!(count, Some(8));
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["f05", "f06", "f07"]);
    }

    #[test]
    fn test_mark_processed_is_one_way() {
        let db = Database::open_in_memory().unwrap();
        seed(&db);
        db.insert_feedback(&feedback("a", "u1", Some(3.0), "x", base())).unwrap();

        let first = db.mark_processed("u1", "a", base()).unwrap().unwrap();
        assert_eq!(first.processed_at, Some(format_ts(base())));

        let later = base() + Duration::hours(1);
        let second = db.mark_processed("u1", "a", later).unwrap().unwrap();
        assert_eq!(second.processed_at, first.processed_at);

        assert!(db.mark_processed("u2", "a", later).unwrap().is_none());

        let unread = FeedbackQuery::new().filter(Predicate::IsNull { column: Column::ProcessedAt });
        assert!(db.query_feedbacks("u1", &unread).unwrap().0.is_empty());
    }
}
