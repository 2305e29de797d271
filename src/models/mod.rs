mod agent;
mod catalog;
mod key;
mod salesperson;

pub use agent::*;
pub use catalog::*;
pub use key::*;
pub use salesperson::*;

use serde::{Deserialize, Deserializer, Serialize};

/// One page of results plus the unpaginated total.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Normalize `(page, page_size)` into `(page, page_size, offset)`.
pub fn paging(page: Option<i64>, page_size: Option<i64>) -> (i64, i64, i64) {
    let page = page.filter(|p| *p > 0).unwrap_or(1);
    let size = page_size
        .filter(|s| *s > 0)
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .min(MAX_PAGE_SIZE);
    (page, size, (page - 1) * size)
}

/// Deserialize a field where an explicit `null` means "clear it".
/// Use with `#[serde(default, deserialize_with = "nullable")]`.
pub(crate) fn nullable<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}
