//! Mock GitHub Enterprise API using wiremock for integration testing.

#![allow(dead_code)]

use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use membersync_github::{CostCenters, EnterpriseTeams, GitHubClient, GitHubConfig, ScimDirectory};
use membersync_reconcile::{ReconcileConfig, RetryPolicy};

pub const ENTERPRISE: &str = "acme";
pub const TOKEN: &str = "ghp_test_token";

/// A wiremock server standing in for `api.github.com`.
pub struct MockGitHubServer {
    server: MockServer,
}

impl MockGitHubServer {
    pub async fn new() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub fn server(&self) -> &MockServer {
        &self.server
    }

    /// A client pointed at this server.
    pub fn client(&self) -> GitHubClient {
        self.client_with_per_page(100)
    }

    pub fn client_with_per_page(&self, per_page: u32) -> GitHubClient {
        let mut config = GitHubConfig::new(TOKEN).with_base_url(&self.uri()).unwrap();
        config.per_page = per_page;
        GitHubClient::new(&config).unwrap()
    }

    pub fn cost_centers(&self) -> CostCenters {
        CostCenters::new(self.client(), ENTERPRISE)
    }

    pub fn teams(&self) -> EnterpriseTeams {
        EnterpriseTeams::new(self.client(), ENTERPRISE)
    }

    pub fn scim(&self) -> ScimDirectory {
        ScimDirectory::new(self.client(), ENTERPRISE)
    }

    /// Absolute `Link` header value pointing at `page` of `path`.
    pub fn next_link(&self, path: &str, page: u32) -> String {
        format!(
            "<{}{path}?per_page=100&page={page}>; rel=\"next\"",
            self.uri()
        )
    }

    // =========================================================================
    // Cost centers
    // =========================================================================

    /// Serve `GET` for one cost center.
    pub async fn mock_cost_center(&self, body: Value) {
        let id = body["id"].as_str().unwrap_or_default().to_string();
        Mock::given(method("GET"))
            .and(path(cost_center_path(&id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    // =========================================================================
    // Teams
    // =========================================================================

    pub async fn mock_team(&self, body: Value) {
        let slug = body["slug"].as_str().unwrap_or_default().to_string();
        Mock::given(method("GET"))
            .and(path(team_path(&slug, &[])))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Serve a page-numbered listing, linking each page to the next.
    pub async fn mock_pages(&self, list_path: &str, pages: Vec<Value>) {
        let count = pages.len() as u32;
        for (i, body) in pages.into_iter().enumerate() {
            let page = i as u32 + 1;
            let mut response = ResponseTemplate::new(200).set_body_json(body);
            if page < count {
                response = response.insert_header("Link", self.next_link(list_path, page + 1).as_str());
            }
            Mock::given(method("GET"))
                .and(path(list_path))
                .and(query_param("page", page.to_string()))
                .respond_with(response)
                .mount(&self.server)
                .await;
        }
    }
}

pub fn cost_center_path(id: &str) -> String {
    format!("/enterprises/{ENTERPRISE}/settings/billing/cost-centers/{id}")
}

pub fn cost_center_resource_path(id: &str) -> String {
    format!("{}/resource", cost_center_path(id))
}

pub fn cost_centers_path() -> String {
    format!("/enterprises/{ENTERPRISE}/settings/billing/cost-centers")
}

pub fn team_path(slug: &str, suffix: &[&str]) -> String {
    let mut p = format!("/enterprises/{ENTERPRISE}/teams");
    if !slug.is_empty() {
        p.push('/');
        p.push_str(slug);
    }
    for s in suffix {
        p.push('/');
        p.push_str(s);
    }
    p
}

pub fn cost_center_json(id: &str, name: &str, state: Option<&str>, resources: &[(&str, &str)]) -> Value {
    let resources: Vec<Value> = resources
        .iter()
        .map(|(kind, name)| json!({"type": kind, "name": name}))
        .collect();
    let mut body = json!({"id": id, "name": name, "resources": resources});
    if let Some(state) = state {
        body["state"] = json!(state);
    }
    body
}

pub fn team_json(id: i64, slug: &str, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "slug": slug,
        "description": null,
        "group_id": null,
        "organization_selection_type": "selected"
    })
}

pub fn logins(names: &[&str]) -> Value {
    Value::Array(
        names
            .iter()
            .enumerate()
            .map(|(i, n)| json!({"login": n, "id": i as i64 + 1}))
            .collect(),
    )
}

/// Engine configuration with millisecond backoff.
pub fn fast_config(max_batch_size: usize) -> ReconcileConfig {
    ReconcileConfig {
        max_batch_size,
        retry: RetryPolicy::fixed(
            Duration::from_millis(1),
            Duration::from_millis(2),
            Duration::from_secs(2),
        ),
    }
}
