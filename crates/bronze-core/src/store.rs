//! Profile persistence seam.
//!
//! The engine never defines what a profile looks like. Bot logic picks its own
//! profile type, implements [`Profile`] for it, and talks to whatever backend
//! implements [`ProfileStore`]. [`MemoryProfileStore`] is the in-process
//! implementation used by tests and the demo bot.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

/// A record that can be stored by id.
pub trait Profile: Clone + Send + Sync + 'static {
    /// Key type, usually the account's user id.
    type Id: Clone + Eq + Hash + Debug + Send + Sync + 'static;

    /// Returns this profile's key.
    fn id(&self) -> Self::Id;
}

/// Key-value-by-id profile storage.
#[async_trait]
pub trait ProfileStore<P: Profile>: Send + Sync {
    /// Fetches the profile stored under `id`, if any.
    async fn get(&self, id: &P::Id) -> anyhow::Result<Option<P>>;

    /// Inserts `profile`, replacing any profile with the same id.
    async fn upsert(&self, profile: P) -> anyhow::Result<()>;
}

/// Shared handle to a profile store.
pub type BoxedProfileStore<P> = Arc<dyn ProfileStore<P>>;

/// A [`ProfileStore`] kept entirely in memory.
#[derive(Debug)]
pub struct MemoryProfileStore<P: Profile> {
    profiles: RwLock<HashMap<P::Id, P>>,
}

impl<P: Profile> Default for MemoryProfileStore<P> {
    fn default() -> Self {
        Self {
            profiles: RwLock::new(HashMap::new()),
        }
    }
}

impl<P: Profile> MemoryProfileStore<P> {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored profiles.
    pub fn len(&self) -> usize {
        self.profiles.read().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.profiles.read().is_empty()
    }
}

#[async_trait]
impl<P: Profile> ProfileStore<P> for MemoryProfileStore<P> {
    async fn get(&self, id: &P::Id) -> anyhow::Result<Option<P>> {
        Ok(self.profiles.read().get(id).cloned())
    }

    async fn upsert(&self, profile: P) -> anyhow::Result<()> {
        self.profiles.write().insert(profile.id(), profile);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct User {
        id: i64,
        coins: i64,
    }

    impl Profile for User {
        type Id = i64;

        fn id(&self) -> i64 {
            self.id
        }
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let store = MemoryProfileStore::<User>::new();
        assert!(store.get(&1).await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing() {
        let store: BoxedProfileStore<User> = Arc::new(MemoryProfileStore::new());
        store.upsert(User { id: 7, coins: 1 }).await.unwrap();
        store.upsert(User { id: 7, coins: 5 }).await.unwrap();

        let user = store.get(&7).await.unwrap();
        assert_eq!(user, Some(User { id: 7, coins: 5 }));
    }
}
