//! SCIM directory listing and lookups.

mod helpers;

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use helpers::mock_github_server::{MockGitHubServer, ENTERPRISE};
use membersync_github::{GitHubError, ScimQuery};

fn users_path() -> String {
    format!("/scim/v2/enterprises/{ENTERPRISE}/Users")
}

fn groups_path() -> String {
    format!("/scim/v2/enterprises/{ENTERPRISE}/Groups")
}

fn scim_user(id: &str, user_name: &str) -> Value {
    json!({
        "schemas": ["urn:ietf:params:scim:schemas:core:2.0:User"],
        "id": id,
        "userName": user_name,
        "active": true,
        "emails": [{"value": format!("{user_name}@example.com"), "primary": true}]
    })
}

fn list_response(total: u64, start: u64, resources: Vec<Value>) -> Value {
    json!({
        "schemas": ["urn:ietf:params:scim:api:messages:2.0:ListResponse"],
        "totalResults": total,
        "startIndex": start,
        "itemsPerPage": resources.len(),
        "Resources": resources
    })
}

#[tokio::test]
async fn test_list_users_walks_start_index() {
    let mock = MockGitHubServer::new().await;

    Mock::given(method("GET"))
        .and(path(users_path()))
        .and(query_param("startIndex", "1"))
        .and(header("Accept", "application/scim+json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(list_response(
            3,
            1,
            vec![scim_user("u-1", "alice"), scim_user("u-2", "bob")],
        )))
        .expect(1)
        .mount(mock.server())
        .await;
    Mock::given(method("GET"))
        .and(path(users_path()))
        .and(query_param("startIndex", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(list_response(
            3,
            3,
            vec![scim_user("u-3", "carol")],
        )))
        .expect(1)
        .mount(mock.server())
        .await;

    let users = mock.scim().list_users(&ScimQuery::default()).await.unwrap();
    let names: Vec<&str> = users.iter().map(|u| u.user_name.as_str()).collect();
    assert_eq!(names, vec!["alice", "bob", "carol"]);
}

#[tokio::test]
async fn test_list_users_passes_filter_and_count() {
    let mock = MockGitHubServer::new().await;

    Mock::given(method("GET"))
        .and(path(users_path()))
        .and(query_param("filter", "userName eq \"mona\""))
        .and(query_param("excludedAttributes", "groups"))
        .and(query_param("count", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(list_response(
            1,
            1,
            vec![scim_user("u-9", "mona")],
        )))
        .expect(1)
        .mount(mock.server())
        .await;

    let query = ScimQuery {
        filter: Some("userName eq \"mona\"".into()),
        excluded_attributes: Some("groups".into()),
        count: Some(10),
    };
    let users = mock.scim().list_users(&query).await.unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].primary_email(), Some("mona@example.com"));
}

#[tokio::test]
async fn test_empty_page_ends_listing_without_total() {
    let mock = MockGitHubServer::new().await;

    Mock::given(method("GET"))
        .and(path(groups_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(list_response(0, 1, vec![])))
        .expect(1)
        .mount(mock.server())
        .await;

    let groups = mock.scim().list_groups(&ScimQuery::default()).await.unwrap();
    assert!(groups.is_empty());
}

#[tokio::test]
async fn test_get_group_and_members() {
    let mock = MockGitHubServer::new().await;

    Mock::given(method("GET"))
        .and(path(format!("{}/g-1", groups_path())))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "schemas": ["urn:ietf:params:scim:schemas:core:2.0:Group"],
            "id": "g-1",
            "externalId": "okta-1",
            "displayName": "Admins",
            "members": [{"value": "u-2"}, {"value": "u-1", "display": "alice"}]
        })))
        .mount(mock.server())
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/missing", groups_path())))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "not found"})))
        .mount(mock.server())
        .await;

    let scim = mock.scim();
    let group = scim.get_group("g-1").await.unwrap().unwrap();
    assert_eq!(group.display_name, "Admins");
    assert_eq!(
        scim.group_members("g-1").await.unwrap().unwrap(),
        vec!["u-1", "u-2"]
    );
    assert!(scim.get_group("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_server_error_aborts_listing() {
    let mock = MockGitHubServer::new().await;

    Mock::given(method("GET"))
        .and(path(users_path()))
        .respond_with(ResponseTemplate::new(503))
        .mount(mock.server())
        .await;

    let err = mock
        .scim()
        .list_users(&ScimQuery::default())
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(503));
    assert!(err.to_string().contains("Service Unavailable"));
}

#[tokio::test]
async fn test_cancelled_listing() {
    let mock = MockGitHubServer::new().await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = mock
        .scim()
        .with_cancellation(cancel)
        .list_users(&ScimQuery::default())
        .await
        .unwrap_err();
    assert!(matches!(err, GitHubError::Cancelled));
}
