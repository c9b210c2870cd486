use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// Page cursor for a list whose total size is known from the last read.
///
/// `current_page` is 1-based and always within `[1, max(total_pages, 1)]`.
/// Deserialized state is passed back through the same clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PaginationState")]
pub struct Pagination {
    current_page: u64,
    page_size: u64,
    total_count: u64,
}

#[derive(Deserialize)]
struct PaginationState {
    current_page: u64,
    page_size: u64,
    total_count: u64,
}

impl From<PaginationState> for Pagination {
    fn from(state: PaginationState) -> Self {
        let mut pagination = Pagination::new(state.page_size);
        pagination.set_total(state.total_count);
        pagination.go_to(state.current_page);
        pagination
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl Pagination {
    /// A zero page size is bumped to 1.
    pub fn new(page_size: u64) -> Self {
        Self {
            current_page: 1,
            page_size: page_size.max(1),
            total_count: 0,
        }
    }

    pub fn current_page(&self) -> u64 {
        self.current_page
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    pub fn total_pages(&self) -> u64 {
        self.total_count.div_ceil(self.page_size)
    }

    fn last_page(&self) -> u64 {
        self.total_pages().max(1)
    }

    /// Jump to `page`, clamped into range. Returns whether the page changed.
    pub fn go_to(&mut self, page: u64) -> bool {
        let target = page.clamp(1, self.last_page());
        let changed = target != self.current_page;
        self.current_page = target;
        changed
    }

    pub fn next(&mut self) -> bool {
        self.go_to(self.current_page.saturating_add(1))
    }

    pub fn prev(&mut self) -> bool {
        self.go_to(self.current_page.saturating_sub(1))
    }

    pub fn next_disabled(&self) -> bool {
        self.current_page >= self.total_pages()
    }

    pub fn prev_disabled(&self) -> bool {
        self.current_page == 1
    }

    /// Record a fresh row count and pull the cursor back in range.
    pub fn set_total(&mut self, total_count: u64) {
        self.total_count = total_count;
        self.current_page = self.current_page.clamp(1, self.last_page());
    }

    pub fn reset(&mut self) {
        self.current_page = 1;
    }

    pub fn offset(&self) -> u64 {
        (self.current_page - 1) * self.page_size
    }

    /// Inclusive row range `(from, to)` of the current page, as row stores
    /// with inclusive range headers expect.
    pub fn range(&self) -> (u64, u64) {
        let from = self.offset();
        (from, from + self.page_size - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_total(total: u64) -> Pagination {
        let mut p = Pagination::new(10);
        p.set_total(total);
        p
    }

    #[test]
    fn test_total_pages_rounds_up() {
        assert_eq!(with_total(23).total_pages(), 3);
        assert_eq!(with_total(20).total_pages(), 2);
        assert_eq!(with_total(0).total_pages(), 0);
    }

    #[test]
    fn test_go_to_clamps() {
        let mut p = with_total(23);
        assert!(p.go_to(5));
        assert_eq!(p.current_page(), 3);
        assert!(p.go_to(0));
        assert_eq!(p.current_page(), 1);
        assert!(!p.go_to(1));
    }

    #[test]
    fn test_disabled_flags() {
        let mut p = with_total(23);
        assert!(p.prev_disabled());
        assert!(!p.next_disabled());
        p.go_to(3);
        assert!(p.next_disabled());
        assert!(!p.next());
        assert!(p.prev());
        assert_eq!(p.current_page(), 2);

        let empty = with_total(0);
        assert!(empty.prev_disabled());
        assert!(empty.next_disabled());
    }

    #[test]
    fn test_shrinking_total_pulls_page_back() {
        let mut p = with_total(95);
        p.go_to(10);
        p.set_total(31);
        assert_eq!(p.current_page(), 4);
        assert_eq!(p.offset(), 30);
        assert_eq!(p.range(), (30, 39));
    }

    #[test]
    fn test_restored_state_is_clamped() {
        let p: Pagination =
            serde_json::from_str(r#"{"current_page":1,"page_size":0,"total_count":5}"#).unwrap();
        assert_eq!(p.page_size(), 1);
        assert_eq!(p.total_pages(), 5);

        let p: Pagination =
            serde_json::from_str(r#"{"current_page":9,"page_size":10,"total_count":5}"#).unwrap();
        assert_eq!(p.current_page(), 1);
        assert_eq!(p.offset(), 0);

        let p: Pagination =
            serde_json::from_str(r#"{"current_page":0,"page_size":10,"total_count":25}"#).unwrap();
        assert_eq!(p.current_page(), 1);

        let kept = with_total(23);
        let back: Pagination = serde_json::from_str(&serde_json::to_string(&kept).unwrap()).unwrap();
        assert_eq!(back, kept);
    }
}
