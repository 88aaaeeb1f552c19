use serde::{Deserialize, Serialize};

use agrisk_core::{DomainError, DomainResult};

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 200;

/// 0-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 0,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    pub fn new(page: Option<u32>, size: Option<u32>) -> DomainResult<Self> {
        let size = size.unwrap_or(DEFAULT_PAGE_SIZE);
        if size == 0 || size > MAX_PAGE_SIZE {
            return Err(DomainError::validation(format!(
                "size must be between 1 and {MAX_PAGE_SIZE}, got {size}"
            )));
        }
        Ok(Self {
            page: page.unwrap_or(0),
            size,
        })
    }

    fn offset(&self) -> usize {
        (self.page as usize).saturating_mul(self.size as usize)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total: u64,
    pub has_more: bool,
}

impl<T> Page<T> {
    /// Slice an already ordered result set.
    pub fn from_vec(all: Vec<T>, request: PageRequest) -> Self {
        let total = all.len();
        let start = request.offset().min(total);
        let items: Vec<T> = all
            .into_iter()
            .skip(start)
            .take(request.size as usize)
            .collect();
        let has_more = start + items.len() < total;
        Self {
            items,
            page: request.page,
            size: request.size,
            total: total as u64,
            has_more,
        }
    }
}
