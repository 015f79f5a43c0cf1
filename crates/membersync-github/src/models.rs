//! Wire types for the GitHub Enterprise endpoints.

use serde::{Deserialize, Serialize};

use membersync_reconcile::{Category, LifecycleState, Memberships, TargetObject};

/// A response that is either a single object or an array holding it.
///
/// Some enterprise team endpoints answer with `[ {...} ]` where an object is
/// documented.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum OneOrFirst<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrFirst<T> {
    pub(crate) fn into_first(self) -> Option<T> {
        match self {
            OneOrFirst::One(item) => Some(item),
            OneOrFirst::Many(items) => items.into_iter().next(),
        }
    }
}

// ============================================================================
// Cost centers
// ============================================================================

/// A resource assigned to a cost center.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostCenterResource {
    /// `User`, `Org` or `Repo` (spelling varies).
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
}

/// An enterprise billing cost center.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostCenter {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure_subscription: Option<String>,
    #[serde(default)]
    pub resources: Vec<CostCenterResource>,
}

impl CostCenter {
    /// GitHub reports archived cost centers as `deleted`.
    #[must_use]
    pub fn lifecycle(&self) -> LifecycleState {
        match LifecycleState::parse(self.state.as_deref().unwrap_or_default()) {
            LifecycleState::Deleted => LifecycleState::Archived,
            other => other,
        }
    }

    #[must_use]
    pub fn target_object(&self) -> TargetObject {
        TargetObject::new(&self.id, &self.name, self.lifecycle())
    }

    /// Assigned resources grouped by category.
    #[must_use]
    pub fn memberships(&self) -> Memberships {
        split_resources(&self.resources)
    }
}

/// Group resources by category. Unknown resource types are ignored; every
/// category is present, possibly empty.
#[must_use]
pub fn split_resources(resources: &[CostCenterResource]) -> Memberships {
    let mut out = Memberships::new();
    for category in Category::ALL {
        out.manage(category);
    }
    for resource in resources {
        if let Some(category) = Category::from_resource_type(&resource.kind) {
            out.insert(category, resource.name.as_str());
        }
    }
    out
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CostCenterList {
    #[serde(rename = "costCenters", default)]
    pub cost_centers: Vec<CostCenter>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct CostCenterNameRequest<'a> {
    pub name: &'a str,
}

/// Body of the assign/remove resource calls. Absent categories are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResourceRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organizations: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repositories: Option<Vec<String>>,
}

impl ResourceRequest {
    /// A request touching a single category.
    #[must_use]
    pub fn single(category: Category, items: &[String]) -> Self {
        let items = Some(items.to_vec());
        match category {
            Category::Users => Self {
                users: items,
                ..Self::default()
            },
            Category::Organizations => Self {
                organizations: items,
                ..Self::default()
            },
            Category::Repositories => Self {
                repositories: items,
                ..Self::default()
            },
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        [&self.users, &self.organizations, &self.repositories]
            .iter()
            .all(|v| v.as_ref().map_or(true, Vec::is_empty))
    }
}

/// A resource moved away from another cost center by an assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReassignedResource {
    pub resource_type: String,
    pub name: String,
    #[serde(default)]
    pub previous_cost_center: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssignResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub reassigned_resources: Vec<ReassignedResource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub cost_center_state: Option<String>,
}

// ============================================================================
// Enterprise teams
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnterpriseTeam {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub slug: String,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub organization_selection_type: String,
}

impl EnterpriseTeam {
    /// Teams have no archive state; an existing team is always active.
    #[must_use]
    pub fn target_object(&self) -> TargetObject {
        TargetObject::new(&self.slug, &self.name, LifecycleState::Active)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TeamCreateRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_selection_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TeamUpdateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_selection_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnterpriseOrg {
    pub login: String,
    pub id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub login: String,
    #[serde(default)]
    pub id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMembership {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct OrganizationSlugsRequest<'a> {
    pub organization_slugs: &'a [String],
}

#[derive(Debug, Serialize)]
pub(crate) struct UsernamesRequest<'a> {
    pub usernames: &'a [String],
}

// ============================================================================
// SCIM
// ============================================================================

/// SCIM `ListResponse` envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimListResponse<T> {
    #[serde(default)]
    pub schemas: Vec<String>,
    #[serde(default)]
    pub total_results: u64,
    #[serde(default)]
    pub start_index: u64,
    #[serde(default)]
    pub items_per_page: u64,
    #[serde(rename = "Resources", default = "Vec::new")]
    pub resources: Vec<T>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, rename = "eTag", skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_changed_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimName {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScimEmail {
    pub value: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub primary: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScimRole {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub primary: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimUser {
    #[serde(default)]
    pub schemas: Vec<String>,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<ScimName>,
    #[serde(default)]
    pub emails: Vec<ScimEmail>,
    #[serde(default)]
    pub roles: Vec<ScimRole>,
    #[serde(default)]
    pub meta: ScimMeta,
}

impl ScimUser {
    /// The primary email, or the first one listed.
    #[must_use]
    pub fn primary_email(&self) -> Option<&str> {
        self.emails
            .iter()
            .find(|e| e.primary)
            .or_else(|| self.emails.first())
            .map(|e| e.value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScimGroupMember {
    pub value: String,
    #[serde(default, rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimGroup {
    #[serde(default)]
    pub schemas: Vec<String>,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub display_name: String,
    #[serde(default)]
    pub members: Vec<ScimGroupMember>,
    #[serde(default)]
    pub meta: ScimMeta,
}

impl ScimGroup {
    /// SCIM user IDs of the group's members, sorted.
    #[must_use]
    pub fn member_values(&self) -> Vec<String> {
        let mut values: Vec<String> = self.members.iter().map(|m| m.value.clone()).collect();
        values.sort();
        values.dedup();
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_split_resources_by_type() {
        let resources = vec![
            CostCenterResource { kind: "User".into(), name: "octocat".into() },
            CostCenterResource { kind: "org".into(), name: "acme".into() },
            CostCenterResource { kind: "Organization".into(), name: "acme-labs".into() },
            CostCenterResource { kind: "Repo".into(), name: "acme/api".into() },
            CostCenterResource { kind: "repository".into(), name: "acme/web".into() },
            CostCenterResource { kind: "Team".into(), name: "ignored".into() },
        ];
        let m = split_resources(&resources);

        assert_eq!(m.get(Category::Users).unwrap().len(), 1);
        assert_eq!(m.get(Category::Organizations).unwrap().len(), 2);
        assert_eq!(m.get(Category::Repositories).unwrap().len(), 2);
        assert_eq!(m.len(), 5);
    }

    #[test]
    fn test_split_resources_manages_empty_categories() {
        let m = split_resources(&[]);
        for category in Category::ALL {
            assert!(m.is_managed(category));
        }
    }

    #[test]
    fn test_cost_center_deleted_is_archived() {
        let cc: CostCenter = serde_json::from_value(json!({
            "id": "cc-1", "name": "Eng", "state": "deleted"
        }))
        .unwrap();
        assert_eq!(cc.lifecycle(), LifecycleState::Archived);
        assert!(cc.resources.is_empty());

        let active: CostCenter = serde_json::from_value(json!({"id": "cc-2", "name": "Ops"})).unwrap();
        assert_eq!(active.lifecycle(), LifecycleState::Active);
    }

    #[test]
    fn test_resource_request_omits_absent_categories() {
        let body = ResourceRequest::single(Category::Repositories, &["acme/api".to_string()]);
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"repositories": ["acme/api"]})
        );
        assert!(ResourceRequest::default().is_empty());
        assert!(!body.is_empty());
    }

    #[test]
    fn test_one_or_first() {
        let one: OneOrFirst<TeamMembership> =
            serde_json::from_value(json!({"state": "active", "role": "member"})).unwrap();
        let many: OneOrFirst<TeamMembership> =
            serde_json::from_value(json!([{"state": "pending", "role": "member"}])).unwrap();
        let none: OneOrFirst<TeamMembership> = serde_json::from_value(json!([])).unwrap();

        assert_eq!(one.into_first().unwrap().state, "active");
        assert_eq!(many.into_first().unwrap().state, "pending");
        assert!(none.into_first().is_none());
    }

    #[test]
    fn test_scim_user_parsing() {
        let user: ScimUser = serde_json::from_value(json!({
            "schemas": ["urn:ietf:params:scim:schemas:core:2.0:User"],
            "id": "u-1",
            "externalId": "ext-1",
            "userName": "mona",
            "displayName": "Mona Lisa",
            "active": true,
            "name": {"givenName": "Mona", "familyName": "Lisa"},
            "emails": [
                {"value": "work@example.com", "type": "work"},
                {"value": "mona@example.com", "primary": true}
            ],
            "meta": {"resourceType": "User", "eTag": "W/\"1\""}
        }))
        .unwrap();

        assert_eq!(user.user_name, "mona");
        assert_eq!(user.primary_email(), Some("mona@example.com"));
        assert_eq!(user.name.unwrap().given_name.as_deref(), Some("Mona"));
        assert_eq!(user.meta.etag.as_deref(), Some("W/\"1\""));
    }

    #[test]
    fn test_scim_group_member_values() {
        let group: ScimGroup = serde_json::from_value(json!({
            "id": "g-1",
            "displayName": "Admins",
            "members": [
                {"value": "u-2", "$ref": "https://x/Users/u-2", "display": "b"},
                {"value": "u-1"},
                {"value": "u-2"}
            ]
        }))
        .unwrap();
        assert_eq!(group.member_values(), vec!["u-1", "u-2"]);
        assert_eq!(group.members[0].reference.as_deref(), Some("https://x/Users/u-2"));
    }
}
