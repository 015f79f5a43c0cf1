//! Enterprise teams, their organization assignments and their members.

use async_trait::async_trait;
use reqwest::Method;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use membersync_reconcile::{
    Category, Cursor, IdentityResolver, MembershipBackend, MutationOp, Page, RemoteError,
    TargetObject, TargetRef,
};

use crate::client::GitHubClient;
use crate::error::{GitHubError, GitHubResult};
use crate::models::{
    EnterpriseOrg, EnterpriseTeam, OneOrFirst, OrganizationSlugsRequest, TeamCreateRequest,
    TeamMember, TeamMembership, TeamUpdateRequest, UsernamesRequest,
};

const TEAM_CATEGORIES: [Category; 2] = [Category::Organizations, Category::Users];

/// Enterprise team endpoints of one enterprise.
///
/// Team slugs carry an `ent:` prefix; they are used verbatim as path
/// segments.
#[derive(Debug, Clone)]
pub struct EnterpriseTeams {
    client: GitHubClient,
    enterprise: String,
    cancel: CancellationToken,
}

impl EnterpriseTeams {
    pub fn new(client: GitHubClient, enterprise: impl Into<String>) -> Self {
        Self {
            client,
            enterprise: enterprise.into(),
            cancel: CancellationToken::new(),
        }
    }

    /// Abort multi-page listings when `cancel` fires.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn enterprise(&self) -> &str {
        &self.enterprise
    }

    fn url(&self, extra: &[&str]) -> GitHubResult<Url> {
        let mut segments = vec!["enterprises", self.enterprise.as_str(), "teams"];
        segments.extend_from_slice(extra);
        self.client.url(&segments)
    }

    // ------------------------------------------------------------------
    // Teams
    // ------------------------------------------------------------------

    pub async fn list(&self) -> GitHubResult<Vec<EnterpriseTeam>> {
        self.client.list_all(self.url(&[])?, &self.cancel).await
    }

    pub async fn get(&self, slug: &str) -> GitHubResult<EnterpriseTeam> {
        let raw: OneOrFirst<EnterpriseTeam> = self.client.get_json(self.url(&[slug])?).await?;
        single_team(raw)
    }

    /// Like [`get`](Self::get) but maps 404 to `None`.
    pub async fn find(&self, slug: &str) -> GitHubResult<Option<EnterpriseTeam>> {
        match self.get(slug).await {
            Ok(team) => Ok(Some(team)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Scan the team list for a numeric ID.
    pub async fn find_by_id(&self, id: i64) -> GitHubResult<Option<EnterpriseTeam>> {
        Ok(self.list().await?.into_iter().find(|t| t.id == id))
    }

    pub async fn create(&self, body: &TeamCreateRequest) -> GitHubResult<EnterpriseTeam> {
        info!(enterprise = %self.enterprise, name = %body.name, "Creating enterprise team");
        let request = self.client.request(Method::POST, self.url(&[])?).json(body);
        single_team(self.client.send_json(request).await?)
    }

    pub async fn update(
        &self,
        slug: &str,
        body: &TeamUpdateRequest,
    ) -> GitHubResult<EnterpriseTeam> {
        info!(enterprise = %self.enterprise, team = slug, "Updating enterprise team");
        let request = self
            .client
            .request(Method::PATCH, self.url(&[slug])?)
            .json(body);
        single_team(self.client.send_json(request).await?)
    }

    pub async fn delete(&self, slug: &str) -> GitHubResult<()> {
        info!(enterprise = %self.enterprise, team = slug, "Deleting enterprise team");
        self.client
            .send_empty(self.client.request(Method::DELETE, self.url(&[slug])?))
            .await
    }

    // ------------------------------------------------------------------
    // Organizations
    // ------------------------------------------------------------------

    pub async fn list_organizations(&self, slug: &str) -> GitHubResult<Vec<EnterpriseOrg>> {
        self.client
            .list_all(self.url(&[slug, "organizations"])?, &self.cancel)
            .await
    }

    pub async fn add_organizations(&self, slug: &str, orgs: &[String]) -> GitHubResult<()> {
        self.post_batch(
            self.url(&[slug, "organizations", "add"])?,
            &OrganizationSlugsRequest {
                organization_slugs: orgs,
            },
            orgs.len(),
        )
        .await
    }

    pub async fn remove_organizations(&self, slug: &str, orgs: &[String]) -> GitHubResult<()> {
        self.post_batch(
            self.url(&[slug, "organizations", "remove"])?,
            &OrganizationSlugsRequest {
                organization_slugs: orgs,
            },
            orgs.len(),
        )
        .await
    }

    // ------------------------------------------------------------------
    // Members
    // ------------------------------------------------------------------

    pub async fn list_members(&self, slug: &str) -> GitHubResult<Vec<TeamMember>> {
        self.client
            .list_all(self.url(&[slug, "memberships"])?, &self.cancel)
            .await
    }

    pub async fn add_members(&self, slug: &str, usernames: &[String]) -> GitHubResult<()> {
        self.post_batch(
            self.url(&[slug, "memberships", "add"])?,
            &UsernamesRequest { usernames },
            usernames.len(),
        )
        .await
    }

    pub async fn remove_members(&self, slug: &str, usernames: &[String]) -> GitHubResult<()> {
        self.post_batch(
            self.url(&[slug, "memberships", "remove"])?,
            &UsernamesRequest { usernames },
            usernames.len(),
        )
        .await
    }

    /// A single user's membership, or `None` when the user is not a member.
    pub async fn get_membership(
        &self,
        slug: &str,
        username: &str,
    ) -> GitHubResult<Option<TeamMembership>> {
        let url = self.url(&[slug, "memberships", username])?;
        match self.client.get_json::<OneOrFirst<TeamMembership>>(url).await {
            Ok(raw) => Ok(raw.into_first()),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn add_member(&self, slug: &str, username: &str) -> GitHubResult<()> {
        info!(team = slug, username, "Adding enterprise team member");
        let url = self.url(&[slug, "memberships", username])?;
        self.client
            .send_empty(self.client.request(Method::PUT, url))
            .await
    }

    /// Remove a single member. Removing a non-member is not an error.
    pub async fn remove_member(&self, slug: &str, username: &str) -> GitHubResult<()> {
        info!(team = slug, username, "Removing enterprise team member");
        let url = self.url(&[slug, "memberships", username])?;
        match self
            .client
            .send_empty(self.client.request(Method::DELETE, url))
            .await
        {
            Err(e) if e.is_not_found() => Ok(()),
            other => other,
        }
    }

    async fn post_batch<B: serde::Serialize + ?Sized>(
        &self,
        url: Url,
        body: &B,
        count: usize,
    ) -> GitHubResult<()> {
        if count == 0 {
            return Ok(());
        }
        debug!(path = %url.path(), count, "Posting enterprise team batch");
        self.client
            .send_empty(self.client.request(Method::POST, url).json(body))
            .await
    }
}

fn single_team(raw: OneOrFirst<EnterpriseTeam>) -> GitHubResult<EnterpriseTeam> {
    raw.into_first().ok_or_else(|| {
        GitHubError::UnexpectedResponse("unexpected enterprise team response".into())
    })
}

#[async_trait]
impl MembershipBackend for EnterpriseTeams {
    fn describe(&self, key: &str) -> String {
        format!("enterprise team {key}")
    }

    fn categories(&self) -> &[Category] {
        &TEAM_CATEGORIES
    }

    async fn get_object(&self, key: &str) -> Result<Option<TargetObject>, RemoteError> {
        Ok(self.find(key).await?.map(|team| team.target_object()))
    }

    async fn list_page(
        &self,
        key: &str,
        category: Category,
        cursor: Option<Cursor>,
    ) -> Result<Page<String>, RemoteError> {
        match category {
            Category::Organizations => {
                let url = self.url(&[key, "organizations"])?;
                let page = self.client.get_page::<EnterpriseOrg>(url, cursor).await?;
                Ok(logins(page, |org| org.login))
            }
            Category::Users => {
                let url = self.url(&[key, "memberships"])?;
                let page = self.client.get_page::<TeamMember>(url, cursor).await?;
                Ok(logins(page, |member| member.login))
            }
            Category::Repositories => Err(no_repositories()),
        }
    }

    async fn mutate(
        &self,
        key: &str,
        op: MutationOp,
        category: Category,
        items: &[String],
    ) -> Result<(), RemoteError> {
        match (category, op) {
            (Category::Organizations, MutationOp::Add) => self.add_organizations(key, items).await?,
            (Category::Organizations, MutationOp::Remove) => {
                self.remove_organizations(key, items).await?
            }
            (Category::Users, MutationOp::Add) => self.add_members(key, items).await?,
            (Category::Users, MutationOp::Remove) => self.remove_members(key, items).await?,
            (Category::Repositories, _) => return Err(no_repositories()),
        }
        Ok(())
    }
}

fn logins<T>(page: Page<T>, login: impl Fn(T) -> String) -> Page<String> {
    Page {
        items: page.items.into_iter().map(login).collect(),
        next_cursor: page.next_cursor,
        advertised_total: page.advertised_total,
    }
}

fn no_repositories() -> RemoteError {
    RemoteError::status(422, "enterprise teams do not own repositories")
}

#[async_trait]
impl IdentityResolver for EnterpriseTeams {
    /// An explicit numeric ID wins. A slug given alongside it is used as a
    /// fast path only when it names the same team; otherwise the team list
    /// is scanned for the ID.
    async fn resolve(&self, target: &TargetRef) -> Result<Option<String>, RemoteError> {
        let Some(raw_id) = target.id.as_deref() else {
            return match target.slug.as_deref() {
                Some(slug) => Ok(self.find(slug).await?.map(|team| team.slug)),
                None => Ok(None),
            };
        };

        let id: i64 = raw_id
            .trim()
            .parse()
            .map_err(|_| RemoteError::status(422, format!("team id {raw_id:?} is not numeric")))?;

        if let Some(slug) = target.slug.as_deref() {
            if let Some(team) = self.find(slug).await?.filter(|team| team.id == id) {
                return Ok(Some(team.slug));
            }
            debug!(team = slug, id, "Slug does not match team id, scanning team list");
        }

        Ok(self.find_by_id(id).await?.map(|team| team.slug))
    }
}
