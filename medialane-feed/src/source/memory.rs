use std::{
    io::{Error, ErrorKind, Result},
    path::Path,
    sync::atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;

use crate::activity::{sort_feed, Activity};

use super::{Cursor, EventSource, Page, Scope};

/// Serves a fixed set of activities, paged by offset cursors.
pub struct MemorySource {
    activities: Vec<Activity>,
    calls: AtomicUsize,
    /// Number of upcoming fetches that fail.
    failures: AtomicUsize,
}

impl MemorySource {
    pub fn new(mut activities: Vec<Activity>) -> Self {
        sort_feed(&mut activities);
        Self {
            activities,
            calls: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
        }
    }

    /// Loads a JSON array of activities.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let activities: Vec<Activity> = serde_json::from_str(&contents).map_err(|e| {
            Error::new(
                ErrorKind::InvalidData,
                format!("failed to parse fixture {}: {}", path.display(), e),
            )
        })?;
        Ok(Self::new(activities))
    }

    /// Makes the next `n` fetches fail with a network error.
    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    /// Number of fetches served so far, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.activities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.activities.is_empty()
    }
}

#[async_trait]
impl EventSource for MemorySource {
    async fn fetch(
        &self,
        scope: &Scope,
        page_size: usize,
        cursor: Option<&Cursor>,
    ) -> Result<Page> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(Error::new(
                ErrorKind::ConnectionRefused,
                "memory source: injected failure",
            ));
        }
        if page_size == 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "page size must be > 0"));
        }

        let offset = match cursor {
            Some(cursor) => cursor.as_str().parse::<usize>().map_err(|e| {
                Error::new(
                    ErrorKind::InvalidInput,
                    format!("invalid cursor {:?}: {}", cursor.as_str(), e),
                )
            })?,
            None => 0,
        };

        let scoped: Vec<&Activity> = self.activities.iter().filter(|a| scope.matches(a)).collect();
        let end = scoped.len().min(offset.saturating_add(page_size));
        let activities = scoped
            .get(offset..end)
            .unwrap_or_default()
            .iter()
            .map(|a| (*a).clone())
            .collect();
        let next_cursor = (end < scoped.len()).then(|| Cursor::new(end.to_string()));

        log::debug!(
            "memory source: {} offset {} -> {} activities, next {:?}",
            scope,
            offset,
            end.saturating_sub(offset),
            next_cursor
        );
        Ok(Page {
            activities,
            next_cursor,
        })
    }
}
