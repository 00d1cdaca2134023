use serde::de::DeserializeOwned;
use serde::Deserialize;

/// An account entry as returned by listing endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    pub id: String,
    pub username: String,
    /// `user` for accounts local to the queried host, `user@domain` otherwise.
    pub acct: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// A status entry. Only the fields the harvest reads are modelled.
#[derive(Debug, Clone, Deserialize)]
pub struct Status {
    pub id: String,
    pub account: Account,
    #[serde(default)]
    pub reblogs_count: Option<u64>,
    #[serde(default)]
    pub url: Option<String>,
}

/// One page of a cursor-paged listing.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Continuation token for the next page; `None` once the listing is exhausted.
    pub next: Option<String>,
}

/// Decode raw JSON entries one by one, dropping (and logging) the ones that
/// do not match `T` instead of failing the whole page.
pub fn decode_entries<T: DeserializeOwned>(raw: Vec<serde_json::Value>, kind: &str) -> Vec<T> {
    let total = raw.len();
    let items: Vec<T> = raw
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<T>(value) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!(kind, error = %e, "Skipping malformed entry");
                None
            }
        })
        .collect();
    if items.len() < total {
        tracing::warn!(kind, kept = items.len(), total, "Dropped malformed entries from page");
    }
    items
}
