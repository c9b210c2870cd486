use chrono::{TimeZone, Utc};
use tracing::warn;

use pulse_insights::aggregate::{DashboardOverview, overview};
use pulse_insights::board::IssueBoard;
use pulse_insights::controller::{FeedbackListController, ResponseOutcome};
use pulse_types::query::{Column, FeedbackQuery};

use crate::client::{PulseClient, Result};

/// Rows the overview is computed over.
pub const DASHBOARD_WINDOW: u64 = 500;
const ISSUE_WINDOW: u32 = 500;
/// Re-issues allowed when the total shrinks under the current page.
const MAX_PAGE_RETRIES: usize = 3;

impl PulseClient {
    /// Fetch the newest feedback and the issue list concurrently, then run
    /// the aggregation pipeline locally in `tz`.
    pub async fn load_dashboard<Tz: TimeZone>(&self, tz: &Tz) -> Result<DashboardOverview> {
        let query = FeedbackQuery::new()
            .order_by(Column::ReceivedAt, false)
            .range(0, DASHBOARD_WINDOW);

        let (page, issues) = tokio::try_join!(self.query_feedbacks(&query), self.list_issues(ISSUE_WINDOW))?;

        Ok(overview(&page.rows, &issues, tz, Utc::now()))
    }

    /// One list refresh: issue the controller's current query and hand the
    /// answer back. When the total shrank under the current page the
    /// controller clamps and the clamped page is fetched again. Returns
    /// false when the answer was superseded.
    pub async fn refresh_list<Tz: TimeZone>(&self, list: &mut FeedbackListController, tz: &Tz) -> Result<bool> {
        let mut retries = 0;
        loop {
            let now = Utc::now().with_timezone(tz);
            let (ticket, query) = list.begin_request(&now);
            let outcome = match self.query_feedbacks(&query).await {
                Ok(page) => list.apply_response(ticket, page),
                Err(e) => {
                    warn!("Feedback list refresh failed: {}", e);
                    list.fail_request(ticket);
                    return Err(e);
                }
            };
            if outcome != ResponseOutcome::PageMoved || retries == MAX_PAGE_RETRIES {
                return Ok(outcome == ResponseOutcome::Applied);
            }
            retries += 1;
        }
    }

    pub async fn load_board(&self) -> Result<IssueBoard> {
        Ok(IssueBoard::new(self.list_issues(ISSUE_WINDOW).await?))
    }

    /// Optimistically add an issue, then reconcile with the store.
    pub async fn add_issue(&self, board: &mut IssueBoard, username: &str, title: &str) -> Result<()> {
        let pending = board.add(username, title, Utc::now());
        match self.create_issue(title).await {
            Ok(stored) => {
                board.commit(pending, Some(stored));
                Ok(())
            }
            Err(e) => {
                board.rollback(pending);
                Err(e)
            }
        }
    }

    pub async fn rename_issue(&self, board: &mut IssueBoard, id: uuid::Uuid, title: &str) -> Result<()> {
        let Some(pending) = board.rename(id, title) else {
            return Ok(());
        };
        match self.update_issue(id, title).await {
            Ok(stored) => {
                board.commit(pending, Some(stored));
                Ok(())
            }
            Err(e) => {
                board.rollback(pending);
                Err(e)
            }
        }
    }

    pub async fn remove_issue(&self, board: &mut IssueBoard, id: uuid::Uuid) -> Result<()> {
        let Some(pending) = board.remove(id) else {
            return Ok(());
        };
        match self.delete_issue(id).await {
            Ok(()) => {
                board.commit(pending, None);
                Ok(())
            }
            Err(e) => {
                board.rollback(pending);
                Err(e)
            }
        }
    }
}
