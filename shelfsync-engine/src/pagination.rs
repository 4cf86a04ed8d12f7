//! Pagination for canonical view listings (100 rows/page)

/// Page size for all listings
pub const PAGE_SIZE: usize = 100;

/// Page bounds computed from a result count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Current page number (1-indexed)
    pub page: usize,
    pub total_pages: usize,
    /// Index of the first row on the page
    pub offset: usize,
}

impl Pagination {
    /// Slice of `items` covered by this page
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = self.offset.min(items.len());
        let end = (start + PAGE_SIZE).min(items.len());
        &items[start..end]
    }
}

/// Clamp the requested page into `[1, total_pages]`
///
/// ```
/// use shelfsync_engine::pagination::calculate_pagination;
///
/// let p = calculate_pagination(250, 99);
/// assert_eq!(p.page, 3);
/// assert_eq!(p.offset, 200);
/// ```
pub fn calculate_pagination(total_results: usize, requested_page: usize) -> Pagination {
    let total_pages = total_results.div_ceil(PAGE_SIZE);
    let page = requested_page.max(1).min(total_pages.max(1));

    Pagination {
        page,
        total_pages,
        offset: (page - 1) * PAGE_SIZE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_normal() {
        let p = calculate_pagination(250, 2);
        assert_eq!(p.page, 2);
        assert_eq!(p.total_pages, 3);
        assert_eq!(p.offset, 100);
    }

    #[test]
    fn test_pagination_out_of_bounds_low() {
        let p = calculate_pagination(150, 0);
        assert_eq!(p.page, 1);
        assert_eq!(p.offset, 0);
    }

    #[test]
    fn test_pagination_empty() {
        let p = calculate_pagination(0, 4);
        assert_eq!(p.page, 1);
        assert_eq!(p.total_pages, 0);
        assert!(p.slice::<u8>(&[]).is_empty());
    }

    #[test]
    fn test_slice_last_page() {
        let items: Vec<usize> = (0..250).collect();
        let p = calculate_pagination(items.len(), 3);
        let page = p.slice(&items);
        assert_eq!(page.len(), 50);
        assert_eq!(page[0], 200);
    }
}
