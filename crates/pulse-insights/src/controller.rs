use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use tracing::debug;

use pulse_types::api::FeedbackPage;
use pulse_types::models::Feedback;
use pulse_types::query::FeedbackQuery;

use crate::filter::{DateRange, FilterState, RatingFilter, SortDirection, SortField};
use crate::pagination::Pagination;

/// Identifies one issued read. Only the most recent ticket may land.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestTicket(u64);

/// What `apply_response` did with a completed read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseOutcome {
    /// Rows and total were stored.
    Applied,
    /// A newer request was issued since; nothing changed.
    Stale,
    /// The fresh total no longer reaches the requested page, so the cursor
    /// was clamped. The rows were discarded and the caller must issue a new
    /// request for the clamped page.
    PageMoved,
}

/// State for the feedback list screen.
///
/// All mutation goes through named transitions. Any change to filters or
/// sort order moves the cursor back to page 1; responses for superseded
/// requests are dropped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedbackListController {
    filters: FilterState,
    pagination: Pagination,
    rows: Vec<Feedback>,
    latest: u64,
    loading: bool,
}

impl FeedbackListController {
    pub fn new(page_size: u64) -> Self {
        Self {
            pagination: Pagination::new(page_size),
            ..Self::default()
        }
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn pagination(&self) -> &Pagination {
        &self.pagination
    }

    pub fn rows(&self) -> &[Feedback] {
        &self.rows
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    // -- Filter transitions --

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.filters.query = query.into();
        self.pagination.reset();
    }

    pub fn set_rating(&mut self, rating: RatingFilter) {
        self.filters.rating = rating;
        self.pagination.reset();
    }

    pub fn set_date_range(&mut self, date_range: DateRange) {
        self.filters.date_range = date_range;
        self.pagination.reset();
    }

    pub fn set_sender(&mut self, sender: impl Into<String>) {
        self.filters.sender = sender.into();
        self.pagination.reset();
    }

    pub fn set_sort(&mut self, sort: SortField, direction: SortDirection) {
        self.filters.sort = sort;
        self.filters.direction = direction;
        self.pagination.reset();
    }

    pub fn clear_filters(&mut self) {
        self.filters = FilterState::default();
        self.pagination.reset();
    }

    // -- Page transitions --

    pub fn go_to(&mut self, page: u64) -> bool {
        self.pagination.go_to(page)
    }

    pub fn next_page(&mut self) -> bool {
        self.pagination.next()
    }

    pub fn prev_page(&mut self) -> bool {
        self.pagination.prev()
    }

    // -- Requests --

    /// Start a read for the current filters and page. Any earlier ticket
    /// becomes stale.
    pub fn begin_request<Tz: TimeZone>(&mut self, now: &DateTime<Tz>) -> (RequestTicket, FeedbackQuery) {
        self.latest += 1;
        self.loading = true;
        let query = self
            .filters
            .compose(now)
            .range(self.pagination.offset(), self.pagination.page_size())
            .with_count();
        (RequestTicket(self.latest), query)
    }

    /// Apply a completed read. A superseded ticket changes nothing.
    pub fn apply_response(&mut self, ticket: RequestTicket, page: FeedbackPage) -> ResponseOutcome {
        if ticket.0 != self.latest {
            debug!("Dropping stale feedback page (ticket {}, latest {})", ticket.0, self.latest);
            return ResponseOutcome::Stale;
        }
        let requested = self.pagination.current_page();
        if let Some(count) = page.count {
            self.pagination.set_total(count);
        }
        if self.pagination.current_page() != requested {
            debug!(
                "Total shrank to {}, page {} -> {}",
                self.pagination.total_count(),
                requested,
                self.pagination.current_page()
            );
            return ResponseOutcome::PageMoved;
        }
        self.rows = page.rows;
        self.loading = false;
        ResponseOutcome::Applied
    }

    /// A read failed. Prior rows stay on screen.
    pub fn fail_request(&mut self, ticket: RequestTicket) -> bool {
        if ticket.0 != self.latest {
            return false;
        }
        self.loading = false;
        true
    }

    /// Fold a pushed insert into the current view. The row is shown only if
    /// it passes the active filters and the view is the newest-first first
    /// page; otherwise just the total moves.
    pub fn accept_insert<Tz: TimeZone>(&mut self, feedback: Feedback, now: &DateTime<Tz>) -> bool {
        if !self.filters.matches(&feedback, now) {
            return false;
        }
        self.pagination.set_total(self.pagination.total_count() + 1);

        let newest_first = self.filters.sort == SortField::ReceivedAt
            && self.filters.direction == SortDirection::Desc;
        if newest_first && self.pagination.current_page() == 1 {
            self.rows.insert(0, feedback);
            self.rows.truncate(self.pagination.page_size() as usize);
        }
        true
    }
}
