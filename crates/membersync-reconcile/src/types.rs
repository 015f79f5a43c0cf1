//! Domain types shared by the engine and its collaborators.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A named collection owned by a target object.
///
/// Ordering is the processing order within a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Users,
    Organizations,
    Repositories,
}

impl Category {
    /// All categories in processing order.
    pub const ALL: [Category; 3] = [
        Category::Users,
        Category::Organizations,
        Category::Repositories,
    ];

    /// Stable wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Users => "users",
            Category::Organizations => "organizations",
            Category::Repositories => "repositories",
        }
    }

    /// Map a remote resource type name onto a category.
    ///
    /// Accepts singular, plural and short forms case-insensitively
    /// (`User`, `org`, `Repository`, ...). Unknown types yield `None`.
    #[must_use]
    pub fn from_resource_type(kind: &str) -> Option<Self> {
        match kind.trim().to_ascii_lowercase().as_str() {
            "user" | "users" => Some(Category::Users),
            "org" | "orgs" | "organization" | "organizations" => Some(Category::Organizations),
            "repo" | "repos" | "repository" | "repositories" => Some(Category::Repositories),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::from_resource_type(s).ok_or_else(|| format!("unknown category: {s}"))
    }
}

/// Identifier sets keyed by category.
///
/// A category that is absent is unmanaged. A category present with an
/// empty set means "no members".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Memberships(BTreeMap<Category, BTreeSet<String>>);

impl Memberships {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Memberships::set`].
    #[must_use]
    pub fn with<I, S>(mut self, category: Category, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set(category, items);
        self
    }

    /// Replace the identifiers for `category`. Empty identifiers are dropped.
    pub fn set<I, S>(&mut self, category: Category, items: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set = items
            .into_iter()
            .map(Into::into)
            .filter(|s: &String| !s.is_empty())
            .collect();
        self.0.insert(category, set);
    }

    /// Add one identifier to `category`, managing the category if needed.
    pub fn insert(&mut self, category: Category, item: impl Into<String>) {
        let item = item.into();
        let set = self.0.entry(category).or_default();
        if !item.is_empty() {
            set.insert(item);
        }
    }

    /// Mark `category` as managed without adding identifiers.
    pub fn manage(&mut self, category: Category) {
        self.0.entry(category).or_default();
    }

    #[must_use]
    pub fn get(&self, category: Category) -> Option<&BTreeSet<String>> {
        self.0.get(&category)
    }

    #[must_use]
    pub fn is_managed(&self, category: Category) -> bool {
        self.0.contains_key(&category)
    }

    /// Managed categories in processing order.
    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, &BTreeSet<String>)> {
        self.0.iter().map(|(c, s)| (*c, s))
    }

    /// Total number of identifiers across all categories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.values().map(BTreeSet::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keep only the categories managed by `other`.
    #[must_use]
    pub fn restricted_to(&self, other: &Memberships) -> Memberships {
        Memberships(
            self.0
                .iter()
                .filter(|(c, _)| other.is_managed(**c))
                .map(|(c, s)| (*c, s.clone()))
                .collect(),
        )
    }
}

impl FromIterator<(Category, BTreeSet<String>)> for Memberships {
    fn from_iter<T: IntoIterator<Item = (Category, BTreeSet<String>)>>(iter: T) -> Self {
        let mut memberships = Memberships::new();
        for (category, items) in iter {
            memberships.set(category, items);
        }
        memberships
    }
}

/// Continuation token handed back by a list endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Cursor {
    /// 1-based page number.
    Page(u32),
    /// Item offset (SCIM `startIndex`).
    Offset(u64),
    /// Opaque server token.
    Token(String),
}

impl Cursor {
    /// Whether the cursor signals end-of-list.
    #[must_use]
    pub fn is_end(&self) -> bool {
        match self {
            Cursor::Page(n) => *n == 0,
            Cursor::Offset(n) => *n == 0,
            Cursor::Token(t) => t.is_empty(),
        }
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cursor::Page(n) => write!(f, "page {n}"),
            Cursor::Offset(n) => write!(f, "offset {n}"),
            Cursor::Token(t) => write!(f, "token {t:?}"),
        }
    }
}

/// One fetch result from a list endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<Cursor>,
    pub advertised_total: Option<u64>,
}

impl<T> Page<T> {
    /// A terminal page.
    #[must_use]
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_cursor: None,
            advertised_total: None,
        }
    }

    #[must_use]
    pub fn with_next(mut self, cursor: Cursor) -> Self {
        self.next_cursor = Some(cursor);
        self
    }

    #[must_use]
    pub fn with_total(mut self, total: u64) -> Self {
        self.advertised_total = Some(total);
        self
    }

    /// Next cursor, with end-of-list markers folded into `None`.
    #[must_use]
    pub fn continuation(&self) -> Option<&Cursor> {
        self.next_cursor.as_ref().filter(|c| !c.is_end())
    }
}

/// Lifecycle state of a target object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum LifecycleState {
    Active,
    Archived,
    Deleted,
    Unknown(String),
}

impl LifecycleState {
    /// Parse a remote state string. Empty means active.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "active" => LifecycleState::Active,
            "archived" => LifecycleState::Archived,
            "deleted" => LifecycleState::Deleted,
            _ => LifecycleState::Unknown(raw.trim().to_string()),
        }
    }

    /// Only active objects accept membership changes.
    #[must_use]
    pub fn is_mutable(&self) -> bool {
        matches!(self, LifecycleState::Active)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            LifecycleState::Active => "active",
            LifecycleState::Archived => "archived",
            LifecycleState::Deleted => "deleted",
            LifecycleState::Unknown(s) => s,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for LifecycleState {
    fn from(s: String) -> Self {
        LifecycleState::parse(&s)
    }
}

impl From<LifecycleState> for String {
    fn from(s: LifecycleState) -> Self {
        s.as_str().to_string()
    }
}

/// The parent entity owning the membership collections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetObject {
    /// Canonical remote key (cost center ID, team slug).
    pub key: String,
    /// Human-readable name.
    pub name: String,
    pub lifecycle: LifecycleState,
}

impl TargetObject {
    pub fn new(key: impl Into<String>, name: impl Into<String>, lifecycle: LifecycleState) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            lifecycle,
        }
    }
}

/// User-supplied reference to a target, resolved to a canonical key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
}

impl TargetRef {
    pub fn id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            slug: None,
        }
    }

    pub fn slug(slug: impl Into<String>) -> Self {
        Self {
            id: None,
            slug: Some(slug.into()),
        }
    }

    #[must_use]
    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.id.as_deref().map_or(true, str::is_empty)
            && self.slug.as_deref().map_or(true, str::is_empty)
    }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.id, &self.slug) {
            (Some(id), Some(slug)) => write!(f, "{slug} (id {id})"),
            (Some(id), None) => write!(f, "id {id}"),
            (None, Some(slug)) => f.write_str(slug),
            (None, None) => f.write_str("<unset>"),
        }
    }
}

/// Direction of a batched mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationOp {
    Add,
    Remove,
}

impl MutationOp {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationOp::Add => "add",
            MutationOp::Remove => "remove",
        }
    }
}

impl fmt::Display for MutationOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_resource_type() {
        assert_eq!(Category::from_resource_type("User"), Some(Category::Users));
        assert_eq!(Category::from_resource_type("org"), Some(Category::Organizations));
        assert_eq!(
            Category::from_resource_type("Organization"),
            Some(Category::Organizations)
        );
        assert_eq!(Category::from_resource_type("REPO"), Some(Category::Repositories));
        assert_eq!(
            Category::from_resource_type("repository"),
            Some(Category::Repositories)
        );
        assert_eq!(Category::from_resource_type("enterprise"), None);
    }

    #[test]
    fn test_memberships_drop_empty_identifiers() {
        let m = Memberships::new().with(Category::Users, ["alice", "", "bob"]);
        let users = m.get(Category::Users).unwrap();
        assert_eq!(users.len(), 2);
        assert!(!users.contains(""));
    }

    #[test]
    fn test_memberships_empty_set_is_managed() {
        let m = Memberships::new().with(Category::Repositories, Vec::<String>::new());
        assert!(m.is_managed(Category::Repositories));
        assert!(!m.is_managed(Category::Users));
        assert!(m.is_empty());
    }

    #[test]
    fn test_memberships_restricted_to() {
        let observed = Memberships::new()
            .with(Category::Users, ["a"])
            .with(Category::Organizations, ["o"]);
        let desired = Memberships::new().with(Category::Organizations, ["p"]);

        let restricted = observed.restricted_to(&desired);
        assert_eq!(restricted.categories().collect::<Vec<_>>(), vec![Category::Organizations]);
    }

    #[test]
    fn test_memberships_serialize_by_wire_name() {
        let m = Memberships::new().with(Category::Organizations, ["octo"]);
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json, serde_json::json!({ "organizations": ["octo"] }));
    }

    #[test]
    fn test_cursor_end_markers() {
        assert!(Cursor::Page(0).is_end());
        assert!(Cursor::Offset(0).is_end());
        assert!(Cursor::Token(String::new()).is_end());
        assert!(!Cursor::Page(2).is_end());

        let page: Page<String> = Page::last(vec![]).with_next(Cursor::Page(0));
        assert!(page.continuation().is_none());
    }

    #[test]
    fn test_lifecycle_parse() {
        assert_eq!(LifecycleState::parse(""), LifecycleState::Active);
        assert_eq!(LifecycleState::parse("ACTIVE"), LifecycleState::Active);
        assert_eq!(LifecycleState::parse("archived"), LifecycleState::Archived);
        assert_eq!(LifecycleState::parse("Deleted"), LifecycleState::Deleted);
        assert_eq!(
            LifecycleState::parse("suspended"),
            LifecycleState::Unknown("suspended".to_string())
        );
        assert!(!LifecycleState::Deleted.is_mutable());
        assert!(!LifecycleState::Unknown("x".into()).is_mutable());
    }

    #[test]
    fn test_target_ref_display() {
        assert_eq!(TargetRef::id("42").to_string(), "id 42");
        assert_eq!(TargetRef::slug("ent:eng").to_string(), "ent:eng");
        assert_eq!(
            TargetRef::id("42").with_slug("ent:eng").to_string(),
            "ent:eng (id 42)"
        );
        assert!(TargetRef::default().is_empty());
    }
}
