//! GitHub REST/SCIM HTTP client (reqwest-based).

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, LINK};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use membersync_reconcile::{Cursor, Page, Paginator};

use crate::config::GitHubConfig;
use crate::error::{GitHubError, GitHubResult};

/// Media type for the versioned REST API.
pub const GITHUB_JSON: &str = "application/vnd.github+json";

/// Media type for the SCIM endpoints.
pub const SCIM_JSON: &str = "application/scim+json";

/// Error body returned by the REST API.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    documentation_url: Option<String>,
}

/// Thin wrapper over `reqwest::Client` carrying auth, API version and the
/// API root.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: Client,
    base_url: Url,
    per_page: u32,
}

impl GitHubClient {
    /// Build a client from configuration.
    pub fn new(config: &GitHubConfig) -> GitHubResult<Self> {
        config
            .validate()
            .map_err(|e| GitHubError::Config(e.to_string()))?;

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.token))
            .map_err(|_| GitHubError::Config("token contains invalid characters".into()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_JSON));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_str(&config.api_version)
                .map_err(|_| GitHubError::Config("invalid API version".into()))?,
        );

        let http = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .build()
            .map_err(|e| GitHubError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: Url::parse(&config.base_url)?,
            per_page: config.per_page,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    /// Build an endpoint URL from path segments. Each segment is
    /// percent-encoded, so slugs and logins never alter the path structure.
    pub fn url(&self, segments: &[&str]) -> GitHubResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| GitHubError::Config(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Start a request; default headers are already applied.
    #[must_use]
    pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http.request(method, url)
    }

    /// Send a request and decode the JSON response.
    pub async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> GitHubResult<T> {
        let response = self.send(request).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Send a request and discard any response body.
    pub async fn send_empty(&self, request: RequestBuilder) -> GitHubResult<()> {
        self.send(request).await.map(drop)
    }

    /// `GET` a JSON document.
    pub async fn get_json<T: DeserializeOwned>(&self, url: Url) -> GitHubResult<T> {
        self.send_json(self.request(Method::GET, url)).await
    }

    /// Fetch one page of a page-numbered list endpoint.
    ///
    /// `cursor` must be `None` (first page) or `Cursor::Page`. The next page
    /// is taken from the `Link: rel="next"` header.
    pub async fn get_page<T: DeserializeOwned>(
        &self,
        mut url: Url,
        cursor: Option<Cursor>,
    ) -> GitHubResult<Page<T>> {
        let page = match cursor {
            None => 1,
            Some(Cursor::Page(n)) => n,
            Some(other) => {
                return Err(GitHubError::UnexpectedResponse(format!(
                    "page-numbered endpoint cannot continue from {other}"
                )))
            }
        };
        url.query_pairs_mut()
            .append_pair("per_page", &self.per_page.to_string())
            .append_pair("page", &page.to_string());

        let response = self.send(self.request(Method::GET, url)).await?;
        let next = response
            .headers()
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_next_page);
        let body = response.text().await?;
        let items: Vec<T> = serde_json::from_str(&body)?;

        Ok(Page {
            items,
            next_cursor: next.map(Cursor::Page),
            advertised_total: None,
        })
    }

    /// Collect every page of a page-numbered list endpoint.
    pub async fn list_all<T: DeserializeOwned>(
        &self,
        url: Url,
        cancel: &CancellationToken,
    ) -> GitHubResult<Vec<T>> {
        let label = url.path().to_string();
        Paginator::new(cancel.clone())
            .fetch_all(&label, |cursor| self.get_page(url.clone(), cursor))
            .await
            .map_err(GitHubError::from)
    }

    async fn send(&self, request: RequestBuilder) -> GitHubResult<Response> {
        let response = request.send().await?;
        let status = response.status();
        debug!(
            path = %response.url().path(),
            status = status.as_u16(),
            "GitHub request completed"
        );

        if status.is_success() {
            Ok(response)
        } else {
            Err(Self::error_from(response).await)
        }
    }

    async fn error_from(response: Response) -> GitHubError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let parsed = serde_json::from_str::<ErrorBody>(&body).ok();

        let documentation_url = parsed.as_ref().and_then(|b| b.documentation_url.clone());
        let message = parsed
            .and_then(|b| b.message)
            .filter(|m| !m.is_empty())
            .or_else(|| (!body.trim().is_empty()).then(|| body.trim().to_string()))
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string()
            });

        GitHubError::Api {
            status: status.as_u16(),
            message,
            documentation_url,
        }
    }
}

/// Extract the `page` query parameter of the `rel="next"` entry of a
/// `Link` header.
#[must_use]
pub fn parse_next_page(link: &str) -> Option<u32> {
    link.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let target = parts
            .next()?
            .trim()
            .strip_prefix('<')?
            .strip_suffix('>')?;
        if !parts.any(|p| p.trim() == r#"rel="next""#) {
            return None;
        }
        Url::parse(target)
            .ok()?
            .query_pairs()
            .find(|(k, _)| k == "page")
            .and_then(|(_, v)| v.parse().ok())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> GitHubClient {
        let config = GitHubConfig::new("t").with_base_url(base).unwrap();
        GitHubClient::new(&config).unwrap()
    }

    #[test]
    fn test_url_appends_segments() {
        let c = client("https://api.github.com");
        let url = c.url(&["enterprises", "acme", "teams"]).unwrap();
        assert_eq!(url.as_str(), "https://api.github.com/enterprises/acme/teams");
    }

    #[test]
    fn test_url_keeps_base_path() {
        let c = client("https://ghe.example.com/api/v3/");
        let url = c.url(&["enterprises", "acme"]).unwrap();
        assert_eq!(url.as_str(), "https://ghe.example.com/api/v3/enterprises/acme");
    }

    #[test]
    fn test_url_encodes_segments() {
        let c = client("https://api.github.com");
        let url = c.url(&["users", "a/b c"]).unwrap();
        assert_eq!(url.as_str(), "https://api.github.com/users/a%2Fb%20c");
    }

    #[test]
    fn test_parse_next_page() {
        let link = r#"<https://api.github.com/enterprises/acme/teams?per_page=100&page=2>; rel="next", <https://api.github.com/enterprises/acme/teams?per_page=100&page=5>; rel="last""#;
        assert_eq!(parse_next_page(link), Some(2));
    }

    #[test]
    fn test_parse_next_page_absent_on_last_page() {
        let link = r#"<https://api.github.com/x?page=1>; rel="first", <https://api.github.com/x?page=4>; rel="prev""#;
        assert_eq!(parse_next_page(link), None);
        assert_eq!(parse_next_page(""), None);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = GitHubConfig::new("t");
        config.per_page = 0;
        assert!(matches!(
            GitHubClient::new(&config),
            Err(GitHubError::Config(_))
        ));
    }
}
