pub mod error;
pub mod types;

pub use error::{MastodonError, Result};
pub use types::{decode_entries, Account, Page, Status};

use std::time::Duration;

use reqwest::header::{HeaderMap, LINK, RETRY_AFTER};
use reqwest::{Response, StatusCode};
use url::Url;

/// Largest page the listing endpoints hand out.
pub const MAX_PAGE_SIZE: u32 = 40;

/// Stateless client: the target host is an argument of every call, so one
/// client can be shared by concurrent workers hitting different instances.
#[derive(Clone)]
pub struct MastodonClient {
    client: reqwest::Client,
    token: Option<String>,
}

impl MastodonClient {
    pub fn new(token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("fedigraph/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, token })
    }

    /// One page of a host's trending statuses, paged by offset.
    pub async fn trending_statuses(&self, host: &str, offset: u32, limit: u32) -> Result<Vec<Status>> {
        let mut url = base_url(host)?.join("api/v1/trends/statuses")?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.min(MAX_PAGE_SIZE).to_string())
            .append_pair("offset", &offset.to_string());

        let resp = self.get(url).await?;
        let raw: Vec<serde_json::Value> = resp.json().await?;
        Ok(decode_entries(raw, "status"))
    }

    /// One page of the accounts that reshared `status_id`. Pass the previous
    /// page's `next` token as `cursor` to continue.
    pub async fn reblogged_by(
        &self,
        host: &str,
        status_id: &str,
        cursor: Option<&str>,
    ) -> Result<Page<Account>> {
        let mut url = reblogged_by_url(host, status_id)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &MAX_PAGE_SIZE.to_string());
            if let Some(max_id) = cursor {
                query.append_pair("max_id", max_id);
            }
        }

        let resp = self.get(url).await?;
        let next = next_cursor(resp.headers());
        let raw: Vec<serde_json::Value> = resp.json().await?;
        Ok(Page {
            items: decode_entries(raw, "account"),
            next,
        })
    }

    async fn get(&self, url: Url) -> Result<Response> {
        tracing::debug!(url = %url, "GET");
        let mut req = self.client.get(url.clone());
        if let Some(ref token) = self.token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await?;
        check_status(url.as_str(), resp).await
    }
}

async fn check_status(url: &str, resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => Err(MastodonError::NotFound(url.to_string())),
        StatusCode::TOO_MANY_REQUESTS => Err(MastodonError::RateLimited {
            retry_after: resp
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(String::from),
        }),
        _ => {
            let message = resp.text().await.unwrap_or_default();
            Err(MastodonError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}

/// `https://{host}/` for a bare host name. Hosts that already carry a scheme
/// are used as given (local test servers, plain-http instances).
pub fn base_url(host: &str) -> Result<Url> {
    let host = host.trim().trim_end_matches('/');
    if host.is_empty() {
        return Err(MastodonError::Parse("empty host".to_string()));
    }
    let raw = if host.starts_with("http://") || host.starts_with("https://") {
        format!("{host}/")
    } else {
        format!("https://{host}/")
    };
    Ok(Url::parse(&raw)?)
}

/// `api/v1/statuses/{status_id}/reblogged_by` on `host`, with the id
/// percent-encoded as a single path segment.
pub fn reblogged_by_url(host: &str, status_id: &str) -> Result<Url> {
    let mut url = base_url(host)?;
    url.path_segments_mut()
        .map_err(|_| MastodonError::Parse(format!("host '{host}' cannot carry a path")))?
        .pop_if_empty()
        .extend(["api", "v1", "statuses", status_id, "reblogged_by"]);
    Ok(url)
}

fn next_cursor(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(LINK)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(parse_next_cursor)
}

/// Extract the `max_id` of the `rel="next"` target from a `Link` header value.
pub fn parse_next_cursor(link: &str) -> Option<String> {
    link.split(',').find_map(|part| {
        let (target, params) = part.split_once(';')?;
        let is_next = params
            .split(';')
            .any(|p| matches!(p.trim(), "rel=\"next\"" | "rel=next"));
        if !is_next {
            return None;
        }
        let target = target.trim().strip_prefix('<')?.strip_suffix('>')?;
        let url = Url::parse(target).ok()?;
        url.query_pairs()
            .find(|(k, _)| k == "max_id")
            .map(|(_, v)| v.into_owned())
            .filter(|v| !v.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_host_gets_https_scheme() {
        assert_eq!(base_url("mas.to").unwrap().as_str(), "https://mas.to/");
        assert_eq!(base_url(" mamot.fr/ ").unwrap().as_str(), "https://mamot.fr/");
    }

    #[test]
    fn explicit_scheme_is_kept() {
        assert_eq!(
            base_url("http://127.0.0.1:8080").unwrap().as_str(),
            "http://127.0.0.1:8080/"
        );
    }

    #[test]
    fn empty_host_is_rejected() {
        assert!(matches!(base_url("  "), Err(MastodonError::Parse(_))));
    }

    #[test]
    fn status_id_stays_one_path_segment() {
        assert_eq!(
            reblogged_by_url("mas.to", "115310498566920494").unwrap().as_str(),
            "https://mas.to/api/v1/statuses/115310498566920494/reblogged_by"
        );

        let url = reblogged_by_url("mas.to", "1/../2?x=1#frag").unwrap();
        assert_eq!(
            url.path(),
            "/api/v1/statuses/1%2F..%2F2%3Fx=1%23frag/reblogged_by"
        );
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn next_cursor_is_read_from_link_header() {
        let link = "<https://mas.to/api/v1/statuses/1/reblogged_by?limit=40&max_id=9876>; rel=\"next\", \
                    <https://mas.to/api/v1/statuses/1/reblogged_by?limit=40&since_id=1234>; rel=\"prev\"";
        assert_eq!(parse_next_cursor(link), Some("9876".to_string()));
    }

    #[test]
    fn prev_only_link_means_exhausted() {
        let link = "<https://mas.to/api/v1/statuses/1/reblogged_by?since_id=1234>; rel=\"prev\"";
        assert_eq!(parse_next_cursor(link), None);
    }

    #[test]
    fn next_link_without_max_id_means_exhausted() {
        let link = "<https://mas.to/api/v1/statuses/1/reblogged_by?limit=40>; rel=\"next\"";
        assert_eq!(parse_next_cursor(link), None);
    }

    #[test]
    fn client_builds_without_token() {
        assert!(MastodonClient::new(None, Duration::from_secs(5)).is_ok());
    }
}
