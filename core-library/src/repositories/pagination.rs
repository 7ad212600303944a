//! Offset windows over a repository, with totals for "load more" paging.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_LIMIT: usize = 50;

/// A window of `limit` records starting at `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub offset: usize,
    pub limit: usize,
}

impl PageRequest {
    /// ```
    /// use core_library::repositories::PageRequest;
    ///
    /// let second = PageRequest::first(20).following();
    /// assert_eq!((second.offset, second.limit), (20, 20));
    /// ```
    pub fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }

    pub fn first(limit: usize) -> Self {
        Self::new(0, limit)
    }

    /// The window directly after this one.
    pub fn following(&self) -> Self {
        Self::new(self.offset.saturating_add(self.limit), self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::first(DEFAULT_PAGE_LIMIT)
    }
}

/// Records of one window plus the repository size at query time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub request: PageRequest,
    pub total: usize,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: usize, request: PageRequest) -> Self {
        Self {
            items,
            request,
            total,
        }
    }

    pub fn has_more(&self) -> bool {
        self.request.limit > 0 && self.request.offset + self.items.len() < self.total
    }

    /// Request for the next window, `None` on the last one.
    pub fn next_request(&self) -> Option<PageRequest> {
        self.has_more().then(|| self.request.following())
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            request: self.request,
            total: self.total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_request_until_exhausted() {
        let page = Page::new(vec![1, 2, 3], 7, PageRequest::first(3));
        assert_eq!(page.next_request(), Some(PageRequest::new(3, 3)));

        let last = Page::new(vec![7], 7, PageRequest::new(6, 3));
        assert!(!last.has_more());
        assert_eq!(last.next_request(), None);
    }

    #[test]
    fn test_zero_limit_never_advances() {
        let page: Page<u8> = Page::new(vec![], 5, PageRequest::first(0));
        assert!(!page.has_more());
    }

    #[test]
    fn test_following_saturates() {
        assert_eq!(PageRequest::new(usize::MAX, 2).following().offset, usize::MAX);
    }

    #[test]
    fn test_map_keeps_window() {
        let page = Page::new(vec![1, 2], 4, PageRequest::first(2)).map(|x| x * 10);
        assert_eq!(page.items, vec![10, 20]);
        assert_eq!(page.request, PageRequest::first(2));
    }
}
