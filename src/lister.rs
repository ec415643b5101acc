use std::collections::HashSet;

use anyhow::{Result, anyhow};
use tracing::{debug, trace, warn};

use crate::query::DriveQuery;
use crate::storage::Storage;
use crate::types::MatchSet;
use crate::types::error::GdrmError;

/// Collects every object matching a query, following pagination.
///
/// The whole match set is gathered before anything is deleted, so a listing
/// failure on a later page aborts the run without a single deletion.
///
/// ## Pipeline role
///
/// ```text
/// QueryBuilder → ObjectLister → ObjectDeleter workers → Terminator
/// ```
pub struct ObjectLister {
    target: Storage,
    page_size: i32,
}

impl ObjectLister {
    pub fn new(target: Storage, page_size: i32) -> Self {
        Self { target, page_size }
    }

    /// List all objects matching `query`, in server order.
    ///
    /// Returns an empty match set when nothing matches. Any storage failure,
    /// or a continuation token the service already handed out, fails with
    /// [`GdrmError::List`].
    pub async fn list(&self, query: &DriveQuery) -> Result<MatchSet> {
        debug!(query = %query, "list target objects has started.");

        let mut matches = MatchSet::new();
        let mut seen_page_tokens = HashSet::new();
        let mut page_token: Option<String> = None;
        let mut page_count = 0_u32;
        let mut incomplete_search_warned = false;

        loop {
            let page = self
                .target
                .list_objects_page(query, page_token.clone(), self.page_size)
                .await
                .map_err(|e| anyhow!(GdrmError::List(format!("{:#}", e))))?;
            page_count += 1;

            trace!(
                page = page_count,
                objects = page.files.len(),
                "listing page received."
            );

            if page.incomplete_search && !incomplete_search_warned {
                warn!(
                    query = %query,
                    "Drive reported an incomplete search. Some matching files may not be listed."
                );
                incomplete_search_warned = true;
            }

            matches.extend(page.files);

            match page.next_page_token {
                Some(next) if !next.is_empty() => {
                    if !seen_page_tokens.insert(next.clone()) {
                        return Err(anyhow!(GdrmError::List(format!(
                            "page token repeated after {} pages: {}",
                            page_count, next
                        ))));
                    }
                    page_token = Some(next);
                }
                _ => break,
            }
        }

        debug!(
            pages = page_count,
            objects = matches.len(),
            "list target objects has been completed."
        );
        Ok(matches)
    }
}
