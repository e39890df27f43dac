//! Storefront users, as far as the commerce core needs them.

use chrono::{DateTime, Utc};
use common::UserId;
use document_store::{DocumentStore, SortKey, StoreError, Version};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::Aggregate;
use crate::error::DomainError;
use crate::pagination::{Page, PageRequest};
use crate::repository::{Outcome, Repository};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    User,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: Role,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub version: Version,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl Aggregate for User {
    fn aggregate_type() -> &'static str {
        "User"
    }

    fn collection() -> &'static str {
        "users"
    }

    fn id(&self) -> Uuid {
        self.id.as_uuid()
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![("email", normalize_email(&self.email))]
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// Input for registering a user.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub role: Role,
}

/// Service for user records.
pub struct UserService<S: DocumentStore> {
    users: Repository<S, User>,
}

impl<S: DocumentStore> UserService<S> {
    pub fn new(store: S, write_retries: u32) -> Self {
        Self {
            users: Repository::new(store, write_retries),
        }
    }

    /// Registers a user. An email already in use is a conflict.
    #[tracing::instrument(skip(self, input), fields(email = %input.email))]
    pub async fn register(&self, input: NewUser) -> Result<User, DomainError> {
        let name = input.name.trim();
        let email = normalize_email(&input.email);
        if name.is_empty() {
            return Err(DomainError::InvalidArgument("name is required".into()));
        }
        if !email.contains('@') {
            return Err(DomainError::InvalidArgument(format!(
                "invalid email address '{email}'"
            )));
        }

        let user = User {
            id: UserId::new(),
            name: name.to_string(),
            email,
            phone: input.phone.filter(|p| !p.trim().is_empty()),
            role: input.role,
            active: true,
            created_at: Utc::now(),
            version: Version::initial(),
        };
        match self.users.insert(user).await {
            Ok(user) => {
                tracing::info!(user_id = %user.id, "user registered");
                Ok(user)
            }
            Err(DomainError::Store(StoreError::DuplicateKey { value, .. })) => Err(
                DomainError::Conflict(format!("email {value} is already registered")),
            ),
            Err(e) => Err(e),
        }
    }

    pub async fn get(&self, id: UserId) -> Result<User, DomainError> {
        self.users.load_required(id.as_uuid()).await
    }

    pub async fn find(&self, id: UserId) -> Result<Option<User>, DomainError> {
        self.users.load(id.as_uuid()).await
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, DomainError> {
        self.users.find_by_key("email", &normalize_email(email)).await
    }

    /// Lists users, newest first, optionally searching name, email and phone.
    pub async fn list(
        &self,
        search: Option<&str>,
        page: PageRequest,
    ) -> Result<Page<User>, DomainError> {
        let mut query = self.users.all();
        if let Some(needle) = search.map(str::trim).filter(|s| !s.is_empty()) {
            query = query.search(&["name", "email", "phone"], needle);
        }
        let query = query
            .sort_by(SortKey::CreatedAt, true)
            .page(page.page, page.limit);
        let (items, total) = self.users.query_page(query).await?;
        Ok(Page::new(items, page, total))
    }

    #[tracing::instrument(skip(self))]
    pub async fn set_active(&self, id: UserId, active: bool) -> Result<User, DomainError> {
        let result = self
            .users
            .update(id.as_uuid(), |user| {
                if user.active == active {
                    return Ok(Outcome::Unchanged(()));
                }
                user.active = active;
                Ok(Outcome::Changed(()))
            })
            .await?;
        Ok(result.aggregate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use document_store::InMemoryDocumentStore;

    fn service() -> UserService<InMemoryDocumentStore> {
        UserService::new(InMemoryDocumentStore::new(), 8)
    }

    fn new_user(name: &str, email: &str) -> NewUser {
        NewUser {
            name: name.into(),
            email: email.into(),
            phone: None,
            role: Role::User,
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let users = service();
        users.register(new_user("Asha", "asha@example.com")).await.unwrap();

        let result = users.register(new_user("Other", " ASHA@example.com ")).await;
        assert!(matches!(result, Err(DomainError::Conflict(_))));
    }

    #[tokio::test]
    async fn find_by_email_ignores_case() {
        let users = service();
        let user = users.register(new_user("Asha", "Asha@Example.com")).await.unwrap();

        let found = users.find_by_email("asha@example.COM").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));
    }

    #[tokio::test]
    async fn list_searches_and_pages() {
        let users = service();
        users.register(new_user("Asha Rao", "asha@example.com")).await.unwrap();
        users.register(new_user("Vikram", "vik@example.com")).await.unwrap();
        users.register(new_user("Ravi", "ravi@example.com")).await.unwrap();

        let page = users
            .list(Some("RA"), PageRequest::new(Some(1), Some(20), 20))
            .await
            .unwrap();
        assert_eq!(page.pagination.total_items, 3);

        let page = users
            .list(Some("asha"), PageRequest::new(None, None, 20))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
    }

    #[tokio::test]
    async fn set_active_toggles() {
        let users = service();
        let user = users.register(new_user("Asha", "asha@example.com")).await.unwrap();

        let user = users.set_active(user.id, false).await.unwrap();
        assert!(!user.active);
        assert!(!users.get(user.id).await.unwrap().active);
    }
}
