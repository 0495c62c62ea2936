use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::Result,
    structs::drink_entry::{DrinkEntry, DrinkPatch},
};

pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Paging window for [`EntryStore::list`]. Bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            from: None,
            to: None,
            limit: DEFAULT_LIST_LIMIT,
            offset: 0,
        }
    }
}

impl ListQuery {
    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
            ..Default::default()
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| at >= from) && self.to.map_or(true, |to| at <= to)
    }
}

/// Where drink entries live.
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Every entry whose `logged_at` lies in `[start, end]`, in no particular order.
    async fn fetch_entries(&self, start: DateTime<Utc>, end: DateTime<Utc>)
        -> Result<Vec<DrinkEntry>>;

    /// One page of entries, newest first.
    async fn list(&self, query: ListQuery) -> Result<Vec<DrinkEntry>>;

    async fn insert(&self, entry: DrinkEntry) -> Result<DrinkEntry>;

    async fn update(&self, id: &str, patch: &DrinkPatch) -> Result<DrinkEntry>;

    /// Most recently consumed drink, if any
    async fn latest(&self) -> Result<Option<DrinkEntry>> {
        let page = self
            .list(ListQuery {
                limit: 1,
                ..Default::default()
            })
            .await?;
        Ok(page.into_iter().next())
    }
}
