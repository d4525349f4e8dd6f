//! Shared pagination types for API query parameters.
//!
//! List endpoints use offset-based pagination with `skip` and `limit`.

use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

/// Default number of items to return per page.
pub const DEFAULT_LIMIT: usize = 50;

/// Maximum number of items that can be requested per page.
pub const MAX_LIMIT: usize = 500;

/// Standard pagination parameters.
///
/// `limit` is clamped to `1..=MAX_LIMIT`.
#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct Pagination {
    /// Number of items to skip (default: 0)
    #[param(default = 0, minimum = 0)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub skip: Option<usize>,

    /// Maximum number of items to return (default: 50, max: 500)
    #[param(default = 50, minimum = 1, maximum = 500)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub limit: Option<usize>,
}

impl Pagination {
    #[inline]
    pub fn skip(&self) -> usize {
        self.skip.unwrap_or(0)
    }

    #[inline]
    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    #[inline]
    pub fn params(&self) -> (usize, usize) {
        (self.skip(), self.limit())
    }
}

/// Paginated list wrapper.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaginatedResponse<T: ToSchema> {
    pub data: Vec<T>,
    pub skip: usize,
    pub limit: usize,
}

impl<T: ToSchema> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, skip: usize, limit: usize) -> Self {
        Self { data, skip, limit }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_clamping() {
        let p = Pagination::default();
        assert_eq!(p.params(), (0, DEFAULT_LIMIT));

        let p = Pagination {
            skip: Some(5),
            limit: Some(0),
        };
        assert_eq!(p.params(), (5, 1));

        let p = Pagination {
            skip: None,
            limit: Some(10_000),
        };
        assert_eq!(p.limit(), MAX_LIMIT);
    }

    #[test]
    fn test_parses_from_query_string() {
        let p: Pagination = parse("skip=2&limit=3");
        assert_eq!(p.params(), (2, 3));
    }

    fn parse(query: &str) -> Pagination {
        let uri: axum::http::Uri = format!("/x?{query}").parse().unwrap();
        axum::extract::Query::<Pagination>::try_from_uri(&uri).unwrap().0
    }
}
