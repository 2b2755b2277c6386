use std::fmt;

/// Upper bound for any `limit` query parameter.
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Column a video listing is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    Views,
    Duration,
    Title,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoOrder {
    pub field: SortField,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidOrder(pub String);

impl fmt::Display for InvalidOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid sortBy value: {}", self.0)
    }
}

impl std::error::Error for InvalidOrder {}

impl Default for VideoOrder {
    fn default() -> Self {
        Self::LATEST
    }
}

impl VideoOrder {
    pub const LATEST: Self = Self {
        field: SortField::CreatedAt,
        descending: true,
    };
    pub const OLDEST: Self = Self {
        field: SortField::CreatedAt,
        descending: false,
    };
    pub const POPULAR: Self = Self {
        field: SortField::Views,
        descending: true,
    };

    /// Ordering for the global listing: a column name or one of the
    /// `latest`/`oldest`/`popular` shorthands, plus `sortType` (1 or -1).
    /// The shorthands carry their own direction and ignore `sortType`.
    pub fn from_query(sort_by: Option<&str>, sort_type: Option<i32>) -> Result<Self, InvalidOrder> {
        let descending = match sort_type {
            None | Some(-1) => true,
            Some(1) => false,
            Some(other) => return Err(InvalidOrder(format!("sortType {}", other))),
        };

        let field = match sort_by.unwrap_or("createdAt") {
            "latest" => return Ok(Self::LATEST),
            "oldest" => return Ok(Self::OLDEST),
            "popular" => return Ok(Self::POPULAR),
            "createdAt" => SortField::CreatedAt,
            "views" => SortField::Views,
            "duration" => SortField::Duration,
            "title" => SortField::Title,
            other => return Err(InvalidOrder(other.to_string())),
        };

        Ok(Self { field, descending })
    }

    /// Ordering for a single channel's page, which only knows the shorthands.
    pub fn for_channel(sort_by: Option<&str>) -> Result<Self, InvalidOrder> {
        match sort_by.unwrap_or("latest") {
            "latest" => Ok(Self::LATEST),
            "oldest" => Ok(Self::OLDEST),
            "popular" => Ok(Self::POPULAR),
            other => Err(InvalidOrder(other.to_string())),
        }
    }
}

/// A validated page request. Out-of-range values are clamped rather than
/// rejected: page 0 becomes page 1 and the limit is kept in `1..=MAX_PAGE_LIMIT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub fn new(page: Option<u32>, limit: Option<u32>, default_limit: u32) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(default_limit).clamp(1, MAX_PAGE_LIMIT),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(u64::from(self.limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shorthand_orders_ignore_sort_type() {
        assert_eq!(
            VideoOrder::from_query(Some("popular"), Some(1)).unwrap(),
            VideoOrder::POPULAR
        );
        assert_eq!(
            VideoOrder::from_query(Some("oldest"), None).unwrap(),
            VideoOrder::OLDEST
        );
    }

    #[test]
    fn column_orders_follow_sort_type() {
        let order = VideoOrder::from_query(Some("title"), Some(1)).unwrap();
        assert_eq!(order.field, SortField::Title);
        assert!(!order.descending);

        let order = VideoOrder::from_query(None, None).unwrap();
        assert_eq!(order, VideoOrder::LATEST);
    }

    #[test]
    fn unknown_orders_are_rejected() {
        assert!(VideoOrder::from_query(Some("owner"), None).is_err());
        assert!(VideoOrder::from_query(Some("views"), Some(0)).is_err());
        assert!(VideoOrder::for_channel(Some("views")).is_err());
        assert_eq!(VideoOrder::for_channel(None).unwrap(), VideoOrder::LATEST);
    }

    #[test]
    fn page_request_clamps_and_counts() {
        let page = PageRequest::new(Some(0), Some(500), 10);
        assert_eq!(page.page, 1);
        assert_eq!(page.limit, MAX_PAGE_LIMIT);

        let page = PageRequest::new(Some(3), None, 10);
        assert_eq!(page.offset(), 20);
        assert_eq!(page.total_pages(0), 0);
        assert_eq!(page.total_pages(10), 1);
        assert_eq!(page.total_pages(21), 3);
    }
}
