//! In-process store used when no DSN is configured, and by tests.

use super::{Provider, SessionStore, StoreError, User, UserStore};
use async_trait::async_trait;
use std::{
    collections::HashMap,
    time::{Duration, Instant},
};
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct Users {
    by_id: HashMap<Uuid, User>,
    /// Creation order, for a stable secrets listing.
    order: Vec<Uuid>,
    by_username: HashMap<String, Uuid>,
    by_external: HashMap<(Provider, String), Uuid>,
}

impl Users {
    fn insert(&mut self, user: User) -> User {
        self.order.push(user.id);
        self.by_id.insert(user.id, user.clone());
        user
    }
}

struct SessionEntry {
    user_id: Uuid,
    expires_at: Instant,
}

#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<Users>,
    sessions: Mutex<HashMap<Vec<u8>, SessionEntry>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_local(&self, username: &str, password_hash: &str) -> Result<User, StoreError> {
        let mut users = self.users.lock().await;
        if users.by_username.contains_key(username) {
            return Err(StoreError::Conflict);
        }
        let mut user = User::new(Uuid::new_v4());
        user.username = Some(username.to_string());
        user.password_hash = Some(password_hash.to_string());
        users.by_username.insert(username.to_string(), user.id);
        Ok(users.insert(user))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.lock().await.by_id.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.lock().await;
        Ok(users
            .by_username
            .get(username)
            .and_then(|id| users.by_id.get(id))
            .cloned())
    }

    async fn find_or_create_federated(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<User, StoreError> {
        // Lookup and insert happen under one lock acquisition.
        let mut users = self.users.lock().await;
        let key = (provider, external_id.to_string());
        if let Some(user) = users.by_external.get(&key).and_then(|id| users.by_id.get(id)) {
            return Ok(user.clone());
        }

        let mut user = User::new(Uuid::new_v4());
        match provider {
            Provider::Google => user.google_id = Some(external_id.to_string()),
            Provider::Twitter => user.twitter_id = Some(external_id.to_string()),
        }
        users.by_external.insert(key, user.id);
        Ok(users.insert(user))
    }

    async fn append_secret(&self, id: Uuid, secret: &str) -> Result<bool, StoreError> {
        let mut users = self.users.lock().await;
        Ok(users.by_id.get_mut(&id).map_or(false, |user| {
            user.secrets.push(secret.to_string());
            true
        }))
    }

    async fn all_secrets(&self) -> Result<Vec<String>, StoreError> {
        let users = self.users.lock().await;
        Ok(users
            .order
            .iter()
            .filter_map(|id| users.by_id.get(id))
            .flat_map(|user| user.secrets.iter().cloned())
            .collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn insert_session(
        &self,
        session_hash: &[u8],
        user_id: Uuid,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(session_hash) {
            return Err(StoreError::Conflict);
        }
        let expires_at = Instant::now()
            .checked_add(ttl)
            .ok_or_else(|| StoreError::Unavailable("session ttl overflow".to_string()))?;
        sessions.insert(
            session_hash.to_vec(),
            SessionEntry {
                user_id,
                expires_at,
            },
        );
        Ok(())
    }

    async fn lookup_session(&self, session_hash: &[u8]) -> Result<Option<Uuid>, StoreError> {
        let sessions = self.sessions.lock().await;
        Ok(sessions
            .get(session_hash)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.user_id))
    }

    async fn delete_session(&self, session_hash: &[u8]) -> Result<bool, StoreError> {
        Ok(self.sessions.lock().await.remove(session_hash).is_some())
    }

    async fn purge_expired_sessions(&self) -> Result<u64, StoreError> {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        let now = Instant::now();
        sessions.retain(|_, entry| entry.expires_at > now);
        Ok(u64::try_from(before - sessions.len()).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn insert_local_conflicts_on_username() -> Result<(), StoreError> {
        let store = MemoryStore::new();
        store.insert_local("alice", "hash").await?;
        let second = store.insert_local("alice", "other").await;
        assert!(matches!(second, Err(StoreError::Conflict)));
        assert_eq!(store.users.lock().await.by_id.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn find_or_create_returns_same_user() -> Result<(), StoreError> {
        let store = MemoryStore::new();
        let first = store
            .find_or_create_federated(Provider::Google, "ext-123")
            .await?;
        let second = store
            .find_or_create_federated(Provider::Google, "ext-123")
            .await?;
        assert_eq!(first.id, second.id);

        // Same external id under a different provider is a different identity.
        let other = store
            .find_or_create_federated(Provider::Twitter, "ext-123")
            .await?;
        assert_ne!(first.id, other.id);
        assert_eq!(other.twitter_id.as_deref(), Some("ext-123"));
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_appends_are_not_lost() -> Result<(), StoreError> {
        let store = Arc::new(MemoryStore::new());
        let user = store.insert_local("alice", "hash").await?;

        let mut handles = Vec::new();
        for index in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.append_secret(user.id, &format!("secret-{index}")).await
            }));
        }
        for handle in handles {
            let appended = handle
                .await
                .map_err(|err| StoreError::Unavailable(err.to_string()))??;
            assert!(appended);
        }

        let secrets = store.find_by_id(user.id).await?.map(|user| user.secrets);
        assert_eq!(secrets.map(|secrets| secrets.len()), Some(16));
        Ok(())
    }

    #[tokio::test]
    async fn append_secret_to_missing_user_is_false() -> Result<(), StoreError> {
        let store = MemoryStore::new();
        assert!(!store.append_secret(Uuid::new_v4(), "lost").await?);
        Ok(())
    }

    #[tokio::test]
    async fn all_secrets_flattens_in_creation_order() -> Result<(), StoreError> {
        let store = MemoryStore::new();
        let alice = store.insert_local("alice", "hash").await?;
        let _empty = store.insert_local("carol", "hash").await?;
        let bob = store.insert_local("bob", "hash").await?;
        store.append_secret(bob.id, "from bob").await?;
        store.append_secret(alice.id, "from alice").await?;

        assert_eq!(
            store.all_secrets().await?,
            vec!["from alice".to_string(), "from bob".to_string()]
        );
        Ok(())
    }

    #[tokio::test]
    async fn sessions_expire_and_purge() -> Result<(), StoreError> {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();
        store
            .insert_session(b"live", user_id, Duration::from_secs(60))
            .await?;
        store
            .insert_session(b"dead", user_id, Duration::ZERO)
            .await?;

        assert_eq!(store.lookup_session(b"live").await?, Some(user_id));
        assert_eq!(store.lookup_session(b"dead").await?, None);
        assert!(matches!(
            store
                .insert_session(b"live", user_id, Duration::from_secs(60))
                .await,
            Err(StoreError::Conflict)
        ));

        assert_eq!(store.purge_expired_sessions().await?, 1);
        assert!(store.delete_session(b"live").await?);
        assert!(!store.delete_session(b"live").await?);
        Ok(())
    }
}
