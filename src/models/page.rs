//! Pagination and search filter types shared by every engine.

use serde::Serialize;

/// A 1-based page request. A size of zero or less disables pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub size: i64,
    pub number: i64,
}

impl PageRequest {
    pub fn new(size: i64, number: i64) -> Self {
        Self { size, number }
    }

    /// Every match in a single page.
    pub fn all() -> Self {
        Self { size: 0, number: 1 }
    }

    pub fn is_unbounded(&self) -> bool {
        self.size <= 0
    }

    /// Page numbers below 1 read as the first page.
    pub fn number(&self) -> i64 {
        if self.is_unbounded() {
            1
        } else {
            self.number.max(1)
        }
    }

    pub fn offset(&self) -> i64 {
        if self.is_unbounded() {
            0
        } else {
            (self.number() - 1).saturating_mul(self.size)
        }
    }

    /// SQL `LIMIT` value; `-1` means no limit in SQLite.
    pub fn limit(&self) -> i64 {
        if self.is_unbounded() {
            -1
        } else {
            self.size
        }
    }

    pub fn page_count(&self, total: i64) -> i64 {
        if self.is_unbounded() {
            1
        } else {
            total / self.size + i64::from(total % self.size != 0)
        }
    }
}

/// One page of search results.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub results: Vec<T>,
    /// Match count before paging
    pub total: i64,
    pub page: i64,
    pub page_count: i64,
}

impl<T> Page<T> {
    pub fn new(results: Vec<T>, total: i64, request: PageRequest) -> Self {
        Self {
            results,
            total,
            page: request.number(),
            page_count: request.page_count(total),
        }
    }

    /// Cut the requested page out of a fully materialized, ordered result list.
    pub fn from_vec(all: Vec<T>, request: PageRequest) -> Self {
        let total = all.len() as i64;
        let results = all
            .into_iter()
            .skip(request.offset().max(0) as usize)
            .take(if request.is_unbounded() {
                usize::MAX
            } else {
                request.size as usize
            })
            .collect();
        Self::new(results, total, request)
    }
}

/// Filters applied by item search after the tag query has been resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemQuery {
    /// Candidate ids from a tag query; `None` means every item
    pub ids: Option<Vec<i64>>,
    pub include_private: bool,
    /// Inclusive lower bound on `date`
    pub after: Option<i64>,
    /// Inclusive upper bound on `date`
    pub before: Option<i64>,
}

impl ItemQuery {
    pub fn matches(&self, id: i64, public: bool, date: i64) -> bool {
        if let Some(ids) = &self.ids {
            if !ids.contains(&id) {
                return false;
            }
        }
        (self.include_private || public)
            && self.after.map_or(true, |after| date >= after)
            && self.before.map_or(true, |before| date <= before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_arithmetic() {
        let request = PageRequest::new(10, 4);
        assert_eq!(request.page_count(25), 3);
        assert_eq!(request.offset(), 30);

        let page = Page::from_vec((1..=25).collect::<Vec<i64>>(), request);
        assert!(page.results.is_empty());
        assert_eq!(page.total, 25);
        assert_eq!(page.page, 4);
        assert_eq!(page.page_count, 3);
    }

    #[test]
    fn test_page_count_with_huge_page_size() {
        let request = PageRequest::new(i64::MAX, 1);
        assert_eq!(request.page_count(25), 1);
        assert_eq!(request.page_count(0), 0);
        assert_eq!(PageRequest::new(10, 1).page_count(30), 3);

        let page = Page::from_vec((1..=25).collect::<Vec<i64>>(), request);
        assert_eq!(page.results.len(), 25);
        assert_eq!(page.page_count, 1);
    }

    #[test]
    fn test_last_partial_page() {
        let page = Page::from_vec((1..=25).collect::<Vec<i64>>(), PageRequest::new(10, 3));
        assert_eq!(page.results, vec![21, 22, 23, 24, 25]);
    }

    #[test]
    fn test_unbounded_page() {
        let page = Page::from_vec(vec!["a", "b", "c"], PageRequest::new(0, 7));
        assert_eq!(page.results.len(), 3);
        assert_eq!(page.page, 1);
        assert_eq!(page.page_count, 1);
        assert_eq!(PageRequest::new(-5, 2).limit(), -1);
    }

    #[test]
    fn test_page_number_floor() {
        let request = PageRequest::new(5, 0);
        assert_eq!(request.number(), 1);
        assert_eq!(request.offset(), 0);
    }

    #[test]
    fn test_item_query_bounds_inclusive() {
        let query = ItemQuery {
            ids: None,
            include_private: false,
            after: Some(10),
            before: Some(20),
        };
        assert!(query.matches(1, true, 10));
        assert!(query.matches(1, true, 20));
        assert!(!query.matches(1, true, 21));
        assert!(!query.matches(1, false, 15));
    }
}
