//! In-memory membership backend for integration testing.
//!
//! Stores target objects and their memberships, serves them through
//! offset-based pages, records every call, and can be scripted to fail the
//! next N list or mutate calls.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use membersync_reconcile::{
    Category, Cursor, IdentityResolver, LifecycleState, Memberships, MembershipBackend,
    MutationOp, Page, ReconcileConfig, RemoteError, RetryPolicy, TargetObject, TargetRef,
};

/// A call received by the mock backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    GetObject(String),
    ListPage {
        key: String,
        category: Category,
        cursor: Option<Cursor>,
    },
    Mutate {
        key: String,
        op: MutationOp,
        category: Category,
        items: Vec<String>,
    },
}

#[derive(Default)]
struct State {
    objects: HashMap<String, (TargetObject, Memberships)>,
    calls: Vec<Call>,
    mutate_failures: VecDeque<RemoteError>,
    list_failures: VecDeque<RemoteError>,
}

pub struct MockBackend {
    categories: Vec<Category>,
    page_size: usize,
    state: Mutex<State>,
}

impl MockBackend {
    /// Backend handling all three categories with two items per page.
    pub fn new() -> Self {
        Self::with_categories(Category::ALL.to_vec())
    }

    pub fn with_categories(categories: Vec<Category>) -> Self {
        Self {
            categories,
            page_size: 2,
            state: Mutex::new(State::default()),
        }
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Insert an active target with the given memberships.
    pub fn insert(&self, key: &str, memberships: Memberships) {
        self.insert_with_state(key, LifecycleState::Active, memberships);
    }

    pub fn insert_with_state(&self, key: &str, lifecycle: LifecycleState, memberships: Memberships) {
        let target = TargetObject::new(key, format!("{key}-name"), lifecycle);
        self.state
            .lock()
            .unwrap()
            .objects
            .insert(key.to_string(), (target, memberships));
    }

    /// Move a target to a new key, as a rename upstream would.
    pub fn rename(&self, from: &str, to: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some((mut target, memberships)) = state.objects.remove(from) {
            target.key = to.to_string();
            state.objects.insert(to.to_string(), (target, memberships));
        }
    }

    /// Fail the next mutate calls with these errors, in order.
    pub fn fail_next_mutations(&self, errors: impl IntoIterator<Item = RemoteError>) {
        self.state.lock().unwrap().mutate_failures.extend(errors);
    }

    /// Fail the next list calls with these errors, in order.
    pub fn fail_next_lists(&self, errors: impl IntoIterator<Item = RemoteError>) {
        self.state.lock().unwrap().list_failures.extend(errors);
    }

    pub fn memberships(&self, key: &str) -> Option<Memberships> {
        self.state
            .lock()
            .unwrap()
            .objects
            .get(key)
            .map(|(_, m)| m.clone())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    /// Mutate calls as `(op, category, items)`, in order.
    pub fn mutations(&self) -> Vec<(MutationOp, Category, Vec<String>)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Mutate {
                    op,
                    category,
                    items,
                    ..
                } => Some((op, category, items)),
                _ => None,
            })
            .collect()
    }

    pub fn list_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::ListPage { .. }))
            .count()
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl MembershipBackend for MockBackend {
    fn describe(&self, key: &str) -> String {
        format!("mock {key}")
    }

    fn categories(&self) -> &[Category] {
        &self.categories
    }

    async fn get_object(&self, key: &str) -> Result<Option<TargetObject>, RemoteError> {
        self.record(Call::GetObject(key.to_string()));
        let state = self.state.lock().unwrap();
        Ok(state.objects.get(key).map(|(t, _)| t.clone()))
    }

    async fn list_page(
        &self,
        key: &str,
        category: Category,
        cursor: Option<Cursor>,
    ) -> Result<Page<String>, RemoteError> {
        self.record(Call::ListPage {
            key: key.to_string(),
            category,
            cursor: cursor.clone(),
        });

        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.list_failures.pop_front() {
            return Err(err);
        }
        let (_, memberships) = state
            .objects
            .get(key)
            .ok_or_else(|| RemoteError::status(404, "Not Found"))?;

        let all: Vec<String> = memberships
            .get(category)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default();
        let start = match cursor {
            None => 0,
            Some(Cursor::Offset(n)) => usize::try_from(n).unwrap(),
            Some(other) => return Err(RemoteError::status(400, format!("bad cursor {other}"))),
        };
        let end = (start + self.page_size).min(all.len());
        let items = all.get(start..end).map(<[String]>::to_vec).unwrap_or_default();

        let mut page = Page::last(items).with_total(all.len() as u64);
        if end < all.len() {
            page = page.with_next(Cursor::Offset(end as u64));
        }
        Ok(page)
    }

    async fn mutate(
        &self,
        key: &str,
        op: MutationOp,
        category: Category,
        items: &[String],
    ) -> Result<(), RemoteError> {
        self.record(Call::Mutate {
            key: key.to_string(),
            op,
            category,
            items: items.to_vec(),
        });

        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.mutate_failures.pop_front() {
            return Err(err);
        }
        let (_, memberships) = state
            .objects
            .get_mut(key)
            .ok_or_else(|| RemoteError::status(404, "Not Found"))?;

        let mut current = memberships.get(category).cloned().unwrap_or_default();
        for item in items {
            match op {
                MutationOp::Add => current.insert(item.clone()),
                MutationOp::Remove => current.remove(item),
            };
        }
        memberships.set(category, current);
        Ok(())
    }
}

/// Resolver backed by a slug → key table that tests can update.
#[derive(Default)]
pub struct MockResolver {
    keys: Mutex<HashMap<String, String>>,
    calls: Mutex<u32>,
}

impl MockResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map(&self, slug: &str, key: &str) {
        self.keys
            .lock()
            .unwrap()
            .insert(slug.to_string(), key.to_string());
    }

    pub fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl IdentityResolver for MockResolver {
    async fn resolve(&self, target: &TargetRef) -> Result<Option<String>, RemoteError> {
        *self.calls.lock().unwrap() += 1;
        if let Some(id) = &target.id {
            return Ok(Some(id.clone()));
        }
        let keys = self.keys.lock().unwrap();
        Ok(target.slug.as_ref().and_then(|slug| keys.get(slug).cloned()))
    }
}

/// Engine configuration with millisecond retry delays.
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

pub fn users(items: &[&str]) -> Memberships {
    Memberships::new().with(Category::Users, items.iter().copied())
}
