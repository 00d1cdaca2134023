// Test doubles for the harvest pipeline.
//
// MockListing (ListingApi): HashMap-based scripted pages per (host, target),
// with request recording, optional latency, and a peak count of requests
// in flight at once. Unregistered targets answer NotFound.
//
// Plus builders for Account / Status fixtures.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use mastodon_client::{Account, MastodonError, Page, Status};

use crate::traits::ListingApi;

/// Failure a scripted endpoint answers with.
#[derive(Debug, Clone, Copy)]
pub enum MockFailure {
    NotFound,
    RateLimited,
    Api(u16),
    Network,
    /// Panic inside the request future.
    Panic,
}

impl MockFailure {
    fn raise(self, what: &str) -> MastodonError {
        match self {
            MockFailure::NotFound => MastodonError::NotFound(what.to_string()),
            MockFailure::RateLimited => MastodonError::RateLimited { retry_after: None },
            MockFailure::Api(status) => MastodonError::Api {
                status,
                message: format!("scripted failure for {what}"),
            },
            MockFailure::Network => MastodonError::Network(format!("connection reset for {what}")),
            MockFailure::Panic => panic!("scripted panic for {what}"),
        }
    }
}

#[derive(Default)]
struct ReblogScript {
    pages: Vec<Vec<Account>>,
    /// Page index -> failure answered instead of that page.
    failures: HashMap<usize, MockFailure>,
}

enum TrendingScript {
    Statuses(Vec<Status>),
    Fail(MockFailure),
}

/// Scripted listing API.
///
/// Rebloggers: page `i` of a target answers with cursor `"i+1"` while more
/// pages are scripted, and no cursor on the last one.
/// Trending: the full list is sliced by offset and limit.
#[derive(Default)]
pub struct MockListing {
    reblogs: HashMap<(String, String), ReblogScript>,
    trending: HashMap<String, TrendingScript>,
    requests: Mutex<Vec<String>>,
    latency: Duration,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

/// Counts one request as in flight until dropped.
struct InFlight<'a>(&'a MockListing);

impl<'a> InFlight<'a> {
    fn enter(mock: &'a MockListing) -> Self {
        let now = mock.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        mock.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlight(mock)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockListing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_reblogs(mut self, host: &str, status_id: &str, pages: Vec<Vec<Account>>) -> Self {
        self.reblogs
            .entry((host.to_string(), status_id.to_string()))
            .or_default()
            .pages = pages;
        self
    }

    /// Fail the first request for this target.
    pub fn on_reblogs_failure(self, host: &str, status_id: &str, failure: MockFailure) -> Self {
        self.fail_reblogs_page(host, status_id, 0, failure)
    }

    pub fn fail_reblogs_page(
        mut self,
        host: &str,
        status_id: &str,
        page: usize,
        failure: MockFailure,
    ) -> Self {
        self.reblogs
            .entry((host.to_string(), status_id.to_string()))
            .or_default()
            .failures
            .insert(page, failure);
        self
    }

    pub fn on_trending(mut self, host: &str, statuses: Vec<Status>) -> Self {
        self.trending
            .insert(host.to_string(), TrendingScript::Statuses(statuses));
        self
    }

    pub fn on_trending_failure(mut self, host: &str, failure: MockFailure) -> Self {
        self.trending
            .insert(host.to_string(), TrendingScript::Fail(failure));
        self
    }

    /// Every request sleeps this long before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Most requests that were ever awaiting an answer at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    async fn respond(&self) -> InFlight<'_> {
        let guard = InFlight::enter(self);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        guard
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Requests made for one target (status id, or trending host).
    pub fn requests_for(&self, target: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.split('#').next() == Some(target))
            .count()
    }

    fn record(&self, target: &str, detail: &str) {
        self.requests
            .lock()
            .unwrap()
            .push(format!("{target}#{detail}"));
    }
}

#[async_trait]
impl ListingApi for MockListing {
    async fn trending_statuses(
        &self,
        host: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Status>, MastodonError> {
        self.record(host, &offset.to_string());
        let _guard = self.respond().await;
        match self.trending.get(host) {
            None => Err(MastodonError::NotFound(format!("{host}/api/v1/trends/statuses"))),
            Some(TrendingScript::Fail(f)) => Err(f.raise(host)),
            Some(TrendingScript::Statuses(all)) => {
                let start = (offset as usize).min(all.len());
                let end = (start + limit as usize).min(all.len());
                Ok(all[start..end].to_vec())
            }
        }
    }

    async fn reblogged_by(
        &self,
        host: &str,
        status_id: &str,
        cursor: Option<&str>,
    ) -> Result<Page<Account>, MastodonError> {
        self.record(status_id, cursor.unwrap_or("first"));
        let _guard = self.respond().await;
        let what = format!("{host}/statuses/{status_id}");
        let Some(script) = self.reblogs.get(&(host.to_string(), status_id.to_string())) else {
            return Err(MastodonError::NotFound(what));
        };

        let index = match cursor {
            None => 0,
            Some(c) => c
                .parse::<usize>()
                .map_err(|_| MastodonError::Api {
                    status: 400,
                    message: format!("bad cursor {c}"),
                })?,
        };
        if let Some(failure) = script.failures.get(&index) {
            return Err(failure.raise(&what));
        }

        let items = script.pages.get(index).cloned().unwrap_or_default();
        let next = (index + 1 < script.pages.len()).then(|| (index + 1).to_string());
        Ok(Page { items, next })
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn account(id: &str, acct: &str) -> Account {
    Account {
        id: id.to_string(),
        username: acct.split('@').next().unwrap_or(acct).to_string(),
        acct: acct.to_string(),
        display_name: None,
        url: None,
    }
}

/// `n` accounts with ids `{prefix}0..{prefix}{n-1}`.
pub fn accounts(prefix: &str, n: usize) -> Vec<Account> {
    (0..n)
        .map(|i| account(&format!("{prefix}{i}"), &format!("{prefix}{i}@fosstodon.org")))
        .collect()
}

/// `n` trending statuses with ids `{prefix}0..`, each by author `{id}-author`.
pub fn statuses(prefix: &str, n: usize) -> Vec<Status> {
    (0..n)
        .map(|i| {
            let id = format!("{prefix}{i}");
            Status {
                account: account(&format!("{id}-author"), &format!("{id}-author")),
                id,
                reblogs_count: Some(0),
                url: None,
            }
        })
        .collect()
}
