//! Page windows over record lists

use crm_common::backend::Query;

/// Rows per page on every list
pub const PAGE_SIZE: u64 = 50;

/// One page of a list: where it starts and how many pages exist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    /// 1-based page actually served
    pub number: u64,
    /// Page count; zero for an empty list
    pub page_count: u64,
    /// Index of the page's first row
    pub first_row: u64,
}

impl PageWindow {
    /// Window for `requested` over `total_rows` rows.
    ///
    /// Page 0 reads as page 1; a page past the end serves the last page.
    ///
    /// ```
    /// use crm_web::pagination::PageWindow;
    ///
    /// let window = PageWindow::locate(120, 9);
    /// assert_eq!(window.number, 3);
    /// assert_eq!(window.first_row, 100);
    /// ```
    pub fn locate(total_rows: u64, requested: u64) -> Self {
        let page_count = total_rows.div_ceil(PAGE_SIZE);
        let number = requested.clamp(1, page_count.max(1));
        Self {
            number,
            page_count,
            first_row: (number - 1) * PAGE_SIZE,
        }
    }

    /// Restrict `query` to this window's rows
    pub fn apply(&self, query: Query) -> Query {
        query.range(self.first_row as usize, PAGE_SIZE as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_of_three_pages() {
        let window = PageWindow::locate(120, 2);
        assert_eq!(
            window,
            PageWindow { number: 2, page_count: 3, first_row: 50 }
        );
    }

    #[test]
    fn test_requested_page_is_clamped() {
        assert_eq!(PageWindow::locate(75, 40).number, 2);
        assert_eq!(PageWindow::locate(75, 0).first_row, 0);
    }

    #[test]
    fn test_empty_list_serves_page_one() {
        let window = PageWindow::locate(0, 3);
        assert_eq!(window.number, 1);
        assert_eq!(window.page_count, 0);
        assert_eq!(window.first_row, 0);
    }

    #[test]
    fn test_full_last_page_adds_no_extra_page() {
        assert_eq!(PageWindow::locate(100, 1).page_count, 2);
        assert_eq!(PageWindow::locate(101, 1).page_count, 3);
    }
}
