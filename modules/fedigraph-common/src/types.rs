use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Server assumed for handles that carry no `@domain` suffix.
pub const CANONICAL_HOST: &str = "mastodon.social";

/// Which remote listing a harvest run walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingKind {
    /// Trending statuses per host, paged by offset+limit. Yields status authors.
    Authors,
    /// Accounts that reshared a status, paged by an opaque cursor.
    Rebloggers,
}

impl ListingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingKind::Authors => "authors",
            ListingKind::Rebloggers => "rebloggers",
        }
    }
}

impl fmt::Display for ListingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListingKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "authors" => Ok(ListingKind::Authors),
            "rebloggers" => Ok(ListingKind::Rebloggers),
            other => Err(format!(
                "unknown listing kind '{other}' (expected 'authors' or 'rebloggers')"
            )),
        }
    }
}

/// One independently schedulable fetch job: one target resource on one host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkUnit {
    /// Remote resource to paginate (a status id, or a trending offset range).
    pub target_id: String,
    /// Foreign key into a previously harvested entity.
    pub parent_id: String,
    /// Remote instance to query.
    pub host: String,
}

impl WorkUnit {
    pub fn new(
        target_id: impl Into<String>,
        parent_id: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        Self {
            target_id: target_id.into(),
            parent_id: parent_id.into(),
            host: host.into(),
        }
    }
}

/// An account discovered by a successful work unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestRecord {
    pub id: String,
    pub username: String,
    /// `acct` as returned by the remote: `user` for local accounts, `user@domain` otherwise.
    pub handle: String,
    pub parent_id: String,
    pub host: String,
}

impl HarvestRecord {
    /// Home server of the account, derived from the handle.
    pub fn server(&self) -> &str {
        server_of(&self.handle)
    }
}

/// Substring after the first `@` of a handle, or [`CANONICAL_HOST`] when absent.
pub fn server_of(handle: &str) -> &str {
    match handle.split_once('@') {
        Some((_, domain)) if !domain.is_empty() => domain,
        _ => CANONICAL_HOST,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(handle: &str) -> HarvestRecord {
        HarvestRecord {
            id: "1".to_string(),
            username: "alice".to_string(),
            handle: handle.to_string(),
            parent_id: "10".to_string(),
            host: "mas.to".to_string(),
        }
    }

    #[test]
    fn server_comes_from_handle_domain() {
        assert_eq!(record("alice@fosstodon.org").server(), "fosstodon.org");
    }

    #[test]
    fn local_handle_falls_back_to_canonical_host() {
        assert_eq!(record("alice").server(), CANONICAL_HOST);
        assert_eq!(record("alice@").server(), CANONICAL_HOST);
    }

    #[test]
    fn listing_kind_parses_case_insensitively() {
        assert_eq!("Authors".parse::<ListingKind>(), Ok(ListingKind::Authors));
        assert_eq!(" rebloggers ".parse::<ListingKind>(), Ok(ListingKind::Rebloggers));
        assert!("followers".parse::<ListingKind>().is_err());
    }

    #[test]
    fn listing_kind_display_matches_directory_name() {
        assert_eq!(ListingKind::Rebloggers.to_string(), "rebloggers");
    }
}
