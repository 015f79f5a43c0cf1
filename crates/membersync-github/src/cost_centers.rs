//! Enterprise billing cost centers.
//!
//! A cost center owns three resource collections (users, organizations,
//! repositories). The API returns the whole assignment list with the cost
//! center itself, so every category is served from one `GET`.

use async_trait::async_trait;
use reqwest::Method;
use tracing::{debug, info};
use url::Url;

use membersync_reconcile::{
    Category, Cursor, IdentityResolver, MembershipBackend, MutationOp, Page,
    RemoteError, TargetObject, TargetRef,
};

use crate::client::GitHubClient;
use crate::error::{GitHubError, GitHubResult};
use crate::models::{
    ArchiveResponse, AssignResponse, CostCenter, CostCenterList, CostCenterNameRequest,
    ResourceRequest,
};

/// Cost center endpoints of one enterprise.
#[derive(Debug, Clone)]
pub struct CostCenters {
    client: GitHubClient,
    enterprise: String,
}

impl CostCenters {
    pub fn new(client: GitHubClient, enterprise: impl Into<String>) -> Self {
        Self {
            client,
            enterprise: enterprise.into(),
        }
    }

    #[must_use]
    pub fn enterprise(&self) -> &str {
        &self.enterprise
    }

    fn url(&self, extra: &[&str]) -> GitHubResult<Url> {
        let mut segments = vec![
            "enterprises",
            self.enterprise.as_str(),
            "settings",
            "billing",
            "cost-centers",
        ];
        segments.extend_from_slice(extra);
        self.client.url(&segments)
    }

    /// List cost centers, optionally filtered by `active` or `deleted`.
    pub async fn list(&self, state: Option<&str>) -> GitHubResult<Vec<CostCenter>> {
        let mut url = self.url(&[])?;
        if let Some(state) = state.filter(|s| !s.is_empty()) {
            url.query_pairs_mut().append_pair("state", state);
        }
        let list: CostCenterList = self.client.get_json(url).await?;
        Ok(list.cost_centers)
    }

    pub async fn get(&self, id: &str) -> GitHubResult<CostCenter> {
        self.client.get_json(self.url(&[id])?).await
    }

    /// Like [`get`](Self::get) but maps 404 to `None`.
    pub async fn find(&self, id: &str) -> GitHubResult<Option<CostCenter>> {
        match self.get(id).await {
            Ok(cc) => Ok(Some(cc)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Find a cost center by exact name. Active cost centers win over
    /// archived ones with the same name.
    pub async fn find_by_name(&self, name: &str) -> GitHubResult<Option<CostCenter>> {
        let mut matches: Vec<CostCenter> = self
            .list(None)
            .await?
            .into_iter()
            .filter(|cc| cc.name == name)
            .collect();
        matches.sort_by_key(|cc| !cc.lifecycle().is_mutable());
        Ok(matches.into_iter().next())
    }

    pub async fn create(&self, name: &str) -> GitHubResult<CostCenter> {
        info!(enterprise = %self.enterprise, name, "Creating cost center");
        let request = self
            .client
            .request(Method::POST, self.url(&[])?)
            .json(&CostCenterNameRequest { name });
        self.client.send_json(request).await
    }

    pub async fn rename(&self, id: &str, name: &str) -> GitHubResult<CostCenter> {
        info!(enterprise = %self.enterprise, id, name, "Renaming cost center");
        let request = self
            .client
            .request(Method::PATCH, self.url(&[id])?)
            .json(&CostCenterNameRequest { name });
        self.client.send_json(request).await
    }

    /// Archive a cost center. GitHub keeps it, with state `deleted`.
    pub async fn archive(&self, id: &str) -> GitHubResult<ArchiveResponse> {
        info!(enterprise = %self.enterprise, id, "Archiving cost center");
        self.client
            .send_json(self.client.request(Method::DELETE, self.url(&[id])?))
            .await
    }

    /// Assign resources. Resources owned by another cost center move here.
    pub async fn assign(&self, id: &str, body: &ResourceRequest) -> GitHubResult<AssignResponse> {
        if body.is_empty() {
            return Ok(AssignResponse::default());
        }
        let request = self
            .client
            .request(Method::POST, self.url(&[id, "resource"])?)
            .json(body);
        let response: AssignResponse = self.client.send_json(request).await?;
        for moved in &response.reassigned_resources {
            info!(
                cost_center = id,
                resource_type = %moved.resource_type,
                name = %moved.name,
                previous = moved.previous_cost_center.as_deref().unwrap_or(""),
                "Resource reassigned from another cost center"
            );
        }
        Ok(response)
    }

    pub async fn remove(&self, id: &str, body: &ResourceRequest) -> GitHubResult<()> {
        if body.is_empty() {
            return Ok(());
        }
        let request = self
            .client
            .request(Method::DELETE, self.url(&[id, "resource"])?)
            .json(body);
        self.client.send_empty(request).await
    }
}

#[async_trait]
impl MembershipBackend for CostCenters {
    fn describe(&self, key: &str) -> String {
        format!("cost center {key}")
    }

    fn categories(&self) -> &[Category] {
        &Category::ALL
    }

    async fn get_object(&self, key: &str) -> Result<Option<TargetObject>, RemoteError> {
        Ok(self.find(key).await?.map(|cc| cc.target_object()))
    }

    async fn list_page(
        &self,
        key: &str,
        category: Category,
        cursor: Option<Cursor>,
    ) -> Result<Page<String>, RemoteError> {
        if let Some(cursor) = cursor {
            return Err(GitHubError::UnexpectedResponse(format!(
                "cost center resources are not paginated (got {cursor})"
            ))
            .into());
        }
        let cc = self.get(key).await?;
        let items = cc
            .memberships()
            .get(category)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        Ok(Page::last(items))
    }

    async fn mutate(
        &self,
        key: &str,
        op: MutationOp,
        category: Category,
        items: &[String],
    ) -> Result<(), RemoteError> {
        debug!(
            cost_center = key,
            op = %op,
            category = %category,
            count = items.len(),
            "Mutating cost center resources"
        );
        let body = ResourceRequest::single(category, items);
        match op {
            MutationOp::Add => self.assign(key, &body).await.map(drop)?,
            MutationOp::Remove => self.remove(key, &body).await?,
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityResolver for CostCenters {
    /// Resolve by ID when given, otherwise by name (the `slug`).
    async fn resolve(&self, target: &TargetRef) -> Result<Option<String>, RemoteError> {
        if let Some(id) = target.id.as_deref() {
            return Ok(self.find(id).await?.map(|cc| cc.id));
        }
        match target.slug.as_deref() {
            Some(name) => Ok(self.find_by_name(name).await?.map(|cc| cc.id)),
            None => Ok(None),
        }
    }
}
