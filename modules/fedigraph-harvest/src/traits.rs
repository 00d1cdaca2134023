// Trait seam between the harvest core and the remote listing API.
//
// The real implementation is `MastodonClient`; tests use `testing::MockListing`.
// Every call names its host explicitly, so concurrent units targeting
// different instances never share mutable client state.

use async_trait::async_trait;
use mastodon_client::{Account, MastodonClient, MastodonError, Page, Status};

#[async_trait]
pub trait ListingApi: Send + Sync {
    /// Offset+limit paging. An empty page means the listing is exhausted.
    async fn trending_statuses(
        &self,
        host: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Status>, MastodonError>;

    /// Cursor paging. `Page::next == None` means the listing is exhausted.
    async fn reblogged_by(
        &self,
        host: &str,
        status_id: &str,
        cursor: Option<&str>,
    ) -> Result<Page<Account>, MastodonError>;
}

#[async_trait]
impl ListingApi for MastodonClient {
    async fn trending_statuses(
        &self,
        host: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Status>, MastodonError> {
        MastodonClient::trending_statuses(self, host, offset, limit).await
    }

    async fn reblogged_by(
        &self,
        host: &str,
        status_id: &str,
        cursor: Option<&str>,
    ) -> Result<Page<Account>, MastodonError> {
        MastodonClient::reblogged_by(self, host, status_id, cursor).await
    }
}
