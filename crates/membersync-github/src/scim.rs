//! Read-only access to the enterprise SCIM directory.

use reqwest::header::ACCEPT;
use reqwest::Method;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use url::Url;

use membersync_reconcile::{Cursor, Page, Paginator};

use crate::client::{GitHubClient, SCIM_JSON};
use crate::error::{GitHubError, GitHubResult};
use crate::models::{ScimGroup, ScimListResponse, ScimUser};

/// Optional list parameters.
#[derive(Debug, Clone, Default)]
pub struct ScimQuery {
    /// SCIM filter expression, e.g. `userName eq "mona"`.
    pub filter: Option<String>,
    /// Comma-separated attributes to leave out of the response.
    pub excluded_attributes: Option<String>,
    /// Page size; defaults to the client's `per_page`.
    pub count: Option<u32>,
}

/// SCIM `Users` and `Groups` of one enterprise.
#[derive(Debug, Clone)]
pub struct ScimDirectory {
    client: GitHubClient,
    enterprise: String,
    cancel: CancellationToken,
}

impl ScimDirectory {
    pub fn new(client: GitHubClient, enterprise: impl Into<String>) -> Self {
        Self {
            client,
            enterprise: enterprise.into(),
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn url(&self, extra: &[&str]) -> GitHubResult<Url> {
        let mut segments = vec!["scim", "v2", "enterprises", self.enterprise.as_str()];
        segments.extend_from_slice(extra);
        self.client.url(&segments)
    }

    pub async fn list_users(&self, query: &ScimQuery) -> GitHubResult<Vec<ScimUser>> {
        self.list_all("Users", query).await
    }

    pub async fn list_groups(&self, query: &ScimQuery) -> GitHubResult<Vec<ScimGroup>> {
        self.list_all("Groups", query).await
    }

    /// A user by SCIM ID, or `None` when it does not exist.
    pub async fn get_user(&self, id: &str) -> GitHubResult<Option<ScimUser>> {
        self.get_resource("Users", id).await
    }

    /// A group by SCIM ID, or `None` when it does not exist.
    pub async fn get_group(&self, id: &str) -> GitHubResult<Option<ScimGroup>> {
        self.get_resource("Groups", id).await
    }

    /// SCIM user IDs of a group's members.
    pub async fn group_members(&self, id: &str) -> GitHubResult<Option<Vec<String>>> {
        Ok(self.get_group(id).await?.map(|g| g.member_values()))
    }

    async fn get_resource<T: DeserializeOwned>(
        &self,
        resource: &str,
        id: &str,
    ) -> GitHubResult<Option<T>> {
        let request = self
            .client
            .request(Method::GET, self.url(&[resource, id])?)
            .header(ACCEPT, SCIM_JSON);
        match self.client.send_json(request).await {
            Ok(item) => Ok(Some(item)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn list_all<T: DeserializeOwned>(
        &self,
        resource: &str,
        query: &ScimQuery,
    ) -> GitHubResult<Vec<T>> {
        let label = format!("scim {resource}");
        Paginator::new(self.cancel.clone())
            .fetch_all(&label, |cursor| self.list_page(resource, query, cursor))
            .await
            .map_err(GitHubError::from)
    }

    /// One `startIndex`/`count` page. SCIM offsets are 1-based.
    async fn list_page<T: DeserializeOwned>(
        &self,
        resource: &str,
        query: &ScimQuery,
        cursor: Option<Cursor>,
    ) -> GitHubResult<Page<T>> {
        let start = match cursor {
            None => 1,
            Some(Cursor::Offset(n)) => n,
            Some(other) => {
                return Err(GitHubError::UnexpectedResponse(format!(
                    "SCIM listing cannot continue from {other}"
                )))
            }
        };

        let mut url = self.url(&[resource])?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(filter) = query.filter.as_deref().filter(|f| !f.is_empty()) {
                pairs.append_pair("filter", filter);
            }
            if let Some(excluded) = query.excluded_attributes.as_deref().filter(|a| !a.is_empty()) {
                pairs.append_pair("excludedAttributes", excluded);
            }
            pairs
                .append_pair("startIndex", &start.to_string())
                .append_pair(
                    "count",
                    &query.count.unwrap_or(self.client.per_page()).to_string(),
                );
        }

        let request = self
            .client
            .request(Method::GET, url)
            .header(ACCEPT, SCIM_JSON);
        let response: ScimListResponse<T> = self.client.send_json(request).await?;

        let total = response.total_results;
        let received = response.resources.len() as u64;
        let mut page = Page::last(response.resources);
        if total > 0 {
            page = page.with_total(total);
        }
        if received > 0 && !(total > 0 && start.saturating_sub(1) + received >= total) {
            page = page.with_next(Cursor::Offset(start + received));
        }
        Ok(page)
    }
}
