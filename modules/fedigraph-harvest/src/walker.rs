//! Pagination cursor walker: drains one work unit's remote listing.
//!
//! Pages are strictly sequential within a unit. Every request after the first
//! one waits `page_delay` to stay under remote rate limits. There is no retry:
//! a failed unit stays pending and is attempted again by the next run.

use std::sync::Arc;
use std::time::Duration;

use fedigraph_common::{HarvestRecord, ListingKind, WorkUnit};
use mastodon_client::{Account, MastodonError, Status, MAX_PAGE_SIZE};
use thiserror::Error;
use tracing::{debug, info};

use crate::ledger::trending_offset;
use crate::traits::ListingApi;

/// Successful end of a walk.
#[derive(Debug)]
pub enum WalkOutcome {
    /// Listing drained. May be empty when the first page was empty.
    Records(Vec<HarvestRecord>),
    /// Target or endpoint does not exist on the host. Treated as an empty result.
    NotFound,
}

impl WalkOutcome {
    pub fn into_records(self) -> Vec<HarvestRecord> {
        match self {
            WalkOutcome::Records(records) => records,
            WalkOutcome::NotFound => Vec::new(),
        }
    }
}

/// Unit-scoped failure. Never escapes the worker pool.
#[derive(Debug, Error)]
pub enum UnitFailure {
    /// Rate limit, 5xx, malformed response. Recovered by the next run.
    #[error("remote API error: {0}")]
    Remote(#[source] MastodonError),

    /// Anything else: transport failures, bad unit definitions, worker panics.
    #[error("critical failure: {0}")]
    Critical(String),
}

/// Not-found becomes an empty outcome; everything else fails the unit.
fn classify(err: MastodonError) -> Result<WalkOutcome, UnitFailure> {
    match err {
        MastodonError::NotFound(_) => Ok(WalkOutcome::NotFound),
        MastodonError::RateLimited { .. } | MastodonError::Api { .. } | MastodonError::Parse(_) => {
            Err(UnitFailure::Remote(err))
        }
        MastodonError::Network(msg) => Err(UnitFailure::Critical(format!("network: {msg}"))),
    }
}

pub struct Walker {
    api: Arc<dyn ListingApi>,
    kind: ListingKind,
    page_delay: Duration,
    max_records: Option<usize>,
}

impl Walker {
    pub fn new(
        api: Arc<dyn ListingApi>,
        kind: ListingKind,
        page_delay: Duration,
        max_records: Option<usize>,
    ) -> Self {
        Self {
            api,
            kind,
            page_delay,
            max_records,
        }
    }

    /// Walk every page of the unit's listing.
    pub async fn walk(&self, unit: &WorkUnit) -> Result<WalkOutcome, UnitFailure> {
        let walked = match self.kind {
            ListingKind::Authors => self.walk_trending(unit).await,
            ListingKind::Rebloggers => self.walk_rebloggers(unit).await,
        };
        match walked {
            Ok(records) => Ok(WalkOutcome::Records(records)),
            Err(WalkError::Remote(e)) => classify(e),
            Err(WalkError::Failure(f)) => Err(f),
        }
    }

    /// Offset+limit paging over a host's trending statuses.
    async fn walk_trending(&self, unit: &WorkUnit) -> Result<Vec<HarvestRecord>, WalkError> {
        let start = trending_offset(&unit.target_id).ok_or_else(|| {
            UnitFailure::Critical(format!("no start offset in target id '{}'", unit.target_id))
        })?;

        let mut records = Vec::new();
        let mut offset = start;
        let mut page = 0u32;
        loop {
            self.pace(page).await;
            page += 1;

            let statuses = self
                .api
                .trending_statuses(&unit.host, offset, MAX_PAGE_SIZE)
                .await?;
            debug!(target_id = unit.target_id.as_str(), page, offset, entries = statuses.len(), "Trending page");
            if statuses.is_empty() {
                break;
            }
            offset = offset.saturating_add(statuses.len() as u32);
            records.extend(statuses.into_iter().map(|s| author_record(s, unit)));

            if self.cap_reached(&mut records) {
                break;
            }
        }

        info!(target_id = unit.target_id.as_str(), host = unit.host.as_str(), pages = page, records = records.len(), "Trending range drained");
        Ok(records)
    }

    /// Cursor paging over the accounts that reshared a status.
    async fn walk_rebloggers(&self, unit: &WorkUnit) -> Result<Vec<HarvestRecord>, WalkError> {
        let mut records = Vec::new();
        let mut cursor: Option<String> = None;
        let mut page = 0u32;
        loop {
            self.pace(page).await;
            page += 1;

            let result = self
                .api
                .reblogged_by(&unit.host, &unit.target_id, cursor.as_deref())
                .await?;
            debug!(target_id = unit.target_id.as_str(), page, entries = result.items.len(), "Rebloggers page");
            if result.items.is_empty() {
                break;
            }
            records.extend(result.items.into_iter().map(|a| reblogger_record(a, unit)));

            if self.cap_reached(&mut records) {
                break;
            }
            match result.next {
                Some(next) if cursor.as_deref() == Some(next.as_str()) => {
                    tracing::warn!(target_id = unit.target_id.as_str(), cursor = next.as_str(), "Remote repeated its cursor, stopping");
                    break;
                }
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        info!(target_id = unit.target_id.as_str(), host = unit.host.as_str(), pages = page, records = records.len(), "Rebloggers drained");
        Ok(records)
    }

    async fn pace(&self, pages_done: u32) {
        if pages_done > 0 && !self.page_delay.is_zero() {
            tokio::time::sleep(self.page_delay).await;
        }
    }

    /// Truncates to the cap and reports whether it was hit.
    fn cap_reached(&self, records: &mut Vec<HarvestRecord>) -> bool {
        match self.max_records {
            Some(cap) if records.len() >= cap => {
                records.truncate(cap);
                true
            }
            _ => false,
        }
    }
}

enum WalkError {
    Remote(MastodonError),
    Failure(UnitFailure),
}

impl From<MastodonError> for WalkError {
    fn from(err: MastodonError) -> Self {
        WalkError::Remote(err)
    }
}

impl From<UnitFailure> for WalkError {
    fn from(f: UnitFailure) -> Self {
        WalkError::Failure(f)
    }
}

/// A trending status yields its author. The parent is the status that
/// surfaced the author, which is what a later rebloggers run walks.
fn author_record(status: Status, unit: &WorkUnit) -> HarvestRecord {
    HarvestRecord {
        id: status.account.id,
        username: status.account.username,
        handle: status.account.acct,
        parent_id: status.id,
        host: unit.host.clone(),
    }
}

fn reblogger_record(account: Account, unit: &WorkUnit) -> HarvestRecord {
    HarvestRecord {
        id: account.id,
        username: account.username,
        handle: account.acct,
        parent_id: unit.parent_id.clone(),
        host: unit.host.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::trending_target_id;
    use crate::testing::{account, accounts, statuses, MockFailure, MockListing};

    fn walker(api: MockListing, kind: ListingKind, cap: Option<usize>) -> (Walker, Arc<MockListing>) {
        let api = Arc::new(api);
        (Walker::new(api.clone(), kind, Duration::ZERO, cap), api)
    }

    #[tokio::test]
    async fn cursor_walk_requests_k_plus_one_pages() {
        let pages = vec![accounts("a", 40), accounts("b", 40), accounts("c", 40), vec![]];
        let (walker, api) = walker(
            MockListing::new().on_reblogs("mas.to", "100", pages),
            ListingKind::Rebloggers,
            None,
        );

        let records = walker
            .walk(&WorkUnit::new("100", "author-1", "mas.to"))
            .await
            .unwrap()
            .into_records();

        assert_eq!(api.request_count(), 4);
        assert_eq!(records.len(), 120);
        assert!(records.iter().all(|r| r.parent_id == "author-1" && r.host == "mas.to"));
    }

    #[tokio::test]
    async fn cursor_walk_stops_when_no_next_cursor() {
        let pages = vec![accounts("a", 40), accounts("b", 3)];
        let (walker, api) = walker(
            MockListing::new().on_reblogs("mas.to", "100", pages),
            ListingKind::Rebloggers,
            None,
        );

        let records = walker.walk(&WorkUnit::new("100", "p", "mas.to")).await.unwrap().into_records();
        assert_eq!(api.request_count(), 2);
        assert_eq!(records.len(), 43);
    }

    #[tokio::test]
    async fn empty_first_page_yields_no_records() {
        let (walker, api) = walker(
            MockListing::new().on_reblogs("mas.to", "100", vec![vec![]]),
            ListingKind::Rebloggers,
            None,
        );

        let outcome = walker.walk(&WorkUnit::new("100", "p", "mas.to")).await.unwrap();
        assert!(matches!(outcome, WalkOutcome::Records(ref r) if r.is_empty()));
        assert_eq!(api.request_count(), 1);
    }

    #[tokio::test]
    async fn not_found_is_an_empty_outcome() {
        let (walker, _) = walker(
            MockListing::new().on_reblogs_failure("mas.to", "100", MockFailure::NotFound),
            ListingKind::Rebloggers,
            None,
        );

        let outcome = walker.walk(&WorkUnit::new("100", "p", "mas.to")).await.unwrap();
        assert!(matches!(outcome, WalkOutcome::NotFound));
    }

    #[tokio::test]
    async fn remote_errors_are_transient_failures() {
        for failure in [MockFailure::RateLimited, MockFailure::Api(503)] {
            let (walker, _) = walker(
                MockListing::new().on_reblogs_failure("mas.to", "100", failure),
                ListingKind::Rebloggers,
                None,
            );
            let err = walker.walk(&WorkUnit::new("100", "p", "mas.to")).await.unwrap_err();
            assert!(matches!(err, UnitFailure::Remote(_)), "got {err:?}");
        }
    }

    #[tokio::test]
    async fn network_errors_are_critical() {
        let (walker, _) = walker(
            MockListing::new().on_reblogs_failure("mas.to", "100", MockFailure::Network),
            ListingKind::Rebloggers,
            None,
        );
        let err = walker.walk(&WorkUnit::new("100", "p", "mas.to")).await.unwrap_err();
        assert!(matches!(err, UnitFailure::Critical(_)));
    }

    #[tokio::test]
    async fn record_cap_truncates_cursor_walk() {
        let pages = vec![accounts("a", 40), accounts("b", 40), accounts("c", 40)];
        let (walker, api) = walker(
            MockListing::new().on_reblogs("mas.to", "100", pages),
            ListingKind::Rebloggers,
            Some(50),
        );
        let records = walker.walk(&WorkUnit::new("100", "p", "mas.to")).await.unwrap().into_records();
        assert_eq!(records.len(), 50);
        assert_eq!(api.request_count(), 2);
    }

    #[tokio::test]
    async fn trending_walk_pages_by_offset_until_empty() {
        let (walker, api) = walker(
            MockListing::new().on_trending("mas.to", statuses("s", 100)),
            ListingKind::Authors,
            Some(1000),
        );

        let unit = WorkUnit::new(trending_target_id("mas.to", 0), "mas.to", "mas.to");
        let records = walker.walk(&unit).await.unwrap().into_records();

        // 40 + 40 + 20, then an empty page.
        assert_eq!(api.request_count(), 4);
        assert_eq!(records.len(), 100);
        assert_eq!(records[0].parent_id, "s0");
        assert_eq!(records[0].id, "s0-author");
    }

    #[tokio::test]
    async fn trending_walk_starts_at_unit_offset_and_stops_at_cap() {
        let (walker, api) = walker(
            MockListing::new().on_trending("mas.to", statuses("s", 200)),
            ListingKind::Authors,
            Some(50),
        );

        let unit = WorkUnit::new(trending_target_id("mas.to", 100), "mas.to", "mas.to");
        let records = walker.walk(&unit).await.unwrap().into_records();

        assert_eq!(records.len(), 50);
        assert_eq!(records[0].parent_id, "s100");
        assert_eq!(api.request_count(), 2);
    }

    #[tokio::test]
    async fn trending_unit_without_offset_is_critical() {
        let (walker, api) = walker(MockListing::new(), ListingKind::Authors, Some(10));
        let err = walker.walk(&WorkUnit::new("garbage", "h", "h")).await.unwrap_err();
        assert!(matches!(err, UnitFailure::Critical(_)));
        assert_eq!(api.request_count(), 0);
    }

    #[tokio::test]
    async fn failure_mid_walk_discards_collected_pages() {
        let api = MockListing::new()
            .on_reblogs("mas.to", "100", vec![vec![account("1", "a")], vec![account("2", "b")]])
            .fail_reblogs_page("mas.to", "100", 1, MockFailure::Api(500));
        let (walker, api) = walker(api, ListingKind::Rebloggers, None);

        let err = walker.walk(&WorkUnit::new("100", "p", "mas.to")).await.unwrap_err();
        assert!(matches!(err, UnitFailure::Remote(_)));
        assert_eq!(api.request_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn pages_after_the_first_wait_for_the_page_delay() {
        let delay = Duration::from_millis(200);
        let pages = vec![accounts("a", 2), accounts("b", 2), accounts("c", 2)];
        let api = Arc::new(MockListing::new().on_reblogs("mas.to", "100", pages));
        let walker = Walker::new(api.clone(), ListingKind::Rebloggers, delay, None);

        let started = tokio::time::Instant::now();
        let records = walker.walk(&WorkUnit::new("100", "p", "mas.to")).await.unwrap().into_records();
        let elapsed = started.elapsed();

        assert_eq!(records.len(), 6);
        assert_eq!(api.request_count(), 3);
        assert!(elapsed >= delay * 2, "took {elapsed:?}");
        assert!(elapsed < delay * 3, "took {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn single_page_walk_is_not_delayed() {
        let delay = Duration::from_secs(5);
        let api = Arc::new(MockListing::new().on_trending("mas.to", statuses("s", 3)));
        let walker = Walker::new(api, ListingKind::Authors, delay, Some(3));

        let started = tokio::time::Instant::now();
        let unit = WorkUnit::new(trending_target_id("mas.to", 0), "mas.to", "mas.to");
        let records = walker.walk(&unit).await.unwrap().into_records();

        assert_eq!(records.len(), 3);
        assert!(started.elapsed() < delay);
    }

    #[tokio::test]
    async fn trending_failures_are_classified_like_cursor_failures() {
        let unit = WorkUnit::new(trending_target_id("mas.to", 0), "mas.to", "mas.to");

        for failure in [MockFailure::RateLimited, MockFailure::Api(502)] {
            let (w, api) = walker(
                MockListing::new().on_trending_failure("mas.to", failure),
                ListingKind::Authors,
                Some(100),
            );
            let err = w.walk(&unit).await.unwrap_err();
            assert!(matches!(err, UnitFailure::Remote(_)), "got {err:?}");
            assert_eq!(api.requests_for("mas.to"), 1);
        }

        let (w, _) = walker(
            MockListing::new().on_trending_failure("mas.to", MockFailure::NotFound),
            ListingKind::Authors,
            Some(100),
        );
        assert!(matches!(w.walk(&unit).await.unwrap(), WalkOutcome::NotFound));

        let (w, _) = walker(
            MockListing::new().on_trending_failure("mas.to", MockFailure::Network),
            ListingKind::Authors,
            Some(100),
        );
        assert!(matches!(w.walk(&unit).await.unwrap_err(), UnitFailure::Critical(_)));
    }
}
