//! Offset pagination for list operations

use serde::{Deserialize, Serialize};

/// Default page size when the caller does not ask for one
pub const DEFAULT_LIMIT: u32 = 50;
/// Upper bound on page size
pub const MAX_LIMIT: u32 = 500;

/// A page request as received from a caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl PageRequest {
    pub fn new(limit: u32, offset: u32) -> Self {
        Self { limit, offset }.normalized()
    }

    /// Clamps the limit into `1..=MAX_LIMIT`
    pub fn normalized(self) -> Self {
        Self {
            limit: self.limit.clamp(1, MAX_LIMIT),
            offset: self.offset,
        }
    }

    pub fn limit_i64(&self) -> i64 {
        i64::from(self.normalized().limit)
    }

    pub fn offset_i64(&self) -> i64 {
        i64::from(self.offset)
    }
}

/// One page of results together with the unpaginated total
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        let request = request.normalized();
        Self {
            items,
            total,
            limit: request.limit,
            offset: request.offset,
        }
    }

    /// Converts the items while keeping the paging metadata
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            limit: self.limit,
            offset: self.offset,
        }
    }

    pub fn has_more(&self) -> bool {
        u64::from(self.offset) + (self.items.len() as u64) < self.total
    }
}
