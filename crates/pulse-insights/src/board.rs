use chrono::{DateTime, Utc};
use uuid::Uuid;

use pulse_types::models::Issue;

use crate::aggregate::{IssueFrequency, top_issues};

/// The local effect of one optimistic change, kept so it can be undone on
/// its own without touching changes made after it.
#[derive(Debug, Clone)]
enum Change {
    Add { temp_id: Uuid },
    Rename { id: Uuid, previous: String, applied: String },
    Remove { index: usize, issue: Issue },
}

/// An applied-but-unconfirmed change. Hand it back to `commit` once the
/// store accepts the write, or to `rollback` if it was rejected.
#[derive(Debug, Clone)]
#[must_use = "an optimistic change must be committed or rolled back"]
pub struct PendingMutation {
    change: Change,
}

impl PendingMutation {
    /// Placeholder id of an optimistic insert, for matching the server row.
    pub fn temp_id(&self) -> Option<Uuid> {
        match self.change {
            Change::Add { temp_id } => Some(temp_id),
            _ => None,
        }
    }
}

/// Issue list for the tracking screen, with optimistic local edits.
#[derive(Debug, Clone, Default)]
pub struct IssueBoard {
    issues: Vec<Issue>,
}

impl IssueBoard {
    /// `issues` newest first, as the store lists them.
    pub fn new(issues: Vec<Issue>) -> Self {
        Self { issues }
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn replace_all(&mut self, issues: Vec<Issue>) {
        self.issues = issues;
    }

    pub fn top(&self, n: usize) -> Vec<IssueFrequency> {
        top_issues(&self.issues, n)
    }

    pub fn add(&mut self, username: &str, title: &str, now: DateTime<Utc>) -> PendingMutation {
        let temp_id = Uuid::new_v4();
        self.issues.insert(
            0,
            Issue {
                id: temp_id,
                username: username.to_string(),
                issue_title: title.to_string(),
                created_at: now,
            },
        );
        PendingMutation { change: Change::Add { temp_id } }
    }

    pub fn rename(&mut self, id: Uuid, title: &str) -> Option<PendingMutation> {
        let issue = self.issues.iter_mut().find(|i| i.id == id)?;
        let previous = std::mem::replace(&mut issue.issue_title, title.to_string());
        Some(PendingMutation {
            change: Change::Rename { id, previous, applied: title.to_string() },
        })
    }

    pub fn remove(&mut self, id: Uuid) -> Option<PendingMutation> {
        let index = self.issues.iter().position(|i| i.id == id)?;
        let issue = self.issues.remove(index);
        Some(PendingMutation { change: Change::Remove { index, issue } })
    }

    /// Reconcile with what the store returned for the write.
    pub fn commit(&mut self, pending: PendingMutation, stored: Option<Issue>) {
        let Some(stored) = stored else { return };
        let target = match pending.change {
            Change::Add { temp_id } => temp_id,
            Change::Rename { id, .. } => id,
            Change::Remove { .. } => return,
        };
        if let Some(slot) = self.issues.iter_mut().find(|i| i.id == target) {
            *slot = stored;
        }
    }

    /// Undo this change only. Changes applied after it, committed or not,
    /// are left alone: a newer title is not overwritten and a row that is
    /// already back is not duplicated.
    pub fn rollback(&mut self, pending: PendingMutation) {
        match pending.change {
            Change::Add { temp_id } => self.issues.retain(|i| i.id != temp_id),
            Change::Rename { id, previous, applied } => {
                let current = self.issues.iter_mut().find(|i| i.id == id && i.issue_title == applied);
                if let Some(issue) = current {
                    issue.issue_title = previous;
                }
            }
            Change::Remove { index, issue } => {
                if !self.issues.iter().any(|i| i.id == issue.id) {
                    let index = index.min(self.issues.len());
                    self.issues.insert(index, issue);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(title: &str) -> Issue {
        Issue {
            id: Uuid::new_v4(),
            username: "dana".into(),
            issue_title: title.into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_add_commit_swaps_in_server_row() {
        let mut board = IssueBoard::new(vec![issue("Crash")]);
        let pending = board.add("dana", "Login", Utc::now());
        assert_eq!(board.issues()[0].issue_title, "Login");

        let stored = issue("Login");
        let stored_id = stored.id;
        board.commit(pending, Some(stored));
        assert_eq!(board.issues()[0].id, stored_id);
        assert_eq!(board.issues().len(), 2);
    }

    #[test]
    fn test_rejected_changes_roll_back() {
        let original = vec![issue("Crash"), issue("Login")];
        let mut board = IssueBoard::new(original.clone());

        let pending = board.remove(original[0].id).unwrap();
        assert_eq!(board.issues().len(), 1);
        board.rollback(pending);
        assert_eq!(board.issues(), original.as_slice());

        let pending = board.rename(original[1].id, "Sign-in").unwrap();
        assert_eq!(board.issues()[1].issue_title, "Sign-in");
        board.rollback(pending);
        assert_eq!(board.issues(), original.as_slice());

        assert!(board.remove(Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_overlapping_rollback_keeps_later_changes() {
        let mut board = IssueBoard::new(vec![issue("Crash")]);
        let first = board.add("dana", "Login", Utc::now());
        let second = board.add("dana", "Billing", Utc::now());

        let stored = issue("Billing");
        let stored_id = stored.id;
        board.commit(second, Some(stored));
        board.rollback(first);

        let titles: Vec<&str> = board.issues().iter().map(|i| i.issue_title.as_str()).collect();
        assert_eq!(titles, vec!["Billing", "Crash"]);
        assert_eq!(board.issues()[0].id, stored_id);
    }

    #[test]
    fn test_rollback_leaves_newer_rename_and_removal() {
        let original = vec![issue("Crash"), issue("Login"), issue("Billing")];
        let mut board = IssueBoard::new(original.clone());

        let older = board.rename(original[1].id, "Sign-in").unwrap();
        let newer = board.rename(original[1].id, "Auth").unwrap();
        board.commit(newer, None);
        board.rollback(older);
        assert_eq!(board.issues()[1].issue_title, "Auth");

        let removal = board.remove(original[1].id).unwrap();
        let _ = board.remove(original[0].id).unwrap();
        board.rollback(removal);
        let titles: Vec<&str> = board.issues().iter().map(|i| i.issue_title.as_str()).collect();
        assert_eq!(titles, vec!["Billing", "Auth"]);
    }

    #[test]
    fn test_top_reflects_local_edits() {
        let mut board = IssueBoard::new(vec![issue("Crash")]);
        let _pending = board.add("dana", "Crash", Utc::now());
        assert_eq!(board.top(1)[0].count, 2);
    }
}
