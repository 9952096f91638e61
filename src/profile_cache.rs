//! Demographic profile: local snapshot first, remote overlay second.

use std::sync::Arc;

use crate::db::DatabaseError;
use crate::models::{Identity, PartialProfile, RemoteProfile};
use crate::remote::{ProfileSource, RemoteError};
use crate::store::{profile_key, LocalStore};

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("Could not save profile: {0}")]
    Remote(#[from] RemoteError),
    #[error("Local store error: {0}")]
    Store(#[from] DatabaseError),
}

pub struct ProfileCache {
    store: LocalStore,
    remote: Arc<dyn ProfileSource>,
}

impl ProfileCache {
    pub fn new(store: LocalStore, remote: Arc<dyn ProfileSource>) -> Self {
        Self { store, remote }
    }

    /// The locally cached profile of `identity`, if any.
    pub fn cached(&self, identity: &Identity) -> Result<Option<PartialProfile>, DatabaseError> {
        self.store.get_json(&profile_key(&identity.email))
    }

    /// Identity fields overlaid with the local snapshot. Never touches the
    /// remote, so it is ready as soon as the view mounts.
    pub fn local(&self, identity: &Identity) -> PartialProfile {
        let mut profile = PartialProfile {
            name: Some(identity.name.clone()),
            email: Some(identity.email.clone()),
            ..Default::default()
        };

        match self.cached(identity) {
            Ok(Some(local)) => profile.overlay(&local),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Ignoring unreadable cached profile"),
        }
        profile
    }

    /// The remote profile of `identity`. `None` when there is none or the
    /// fetch failed; failures are logged only.
    pub async fn fetch_remote(&self, identity: &Identity) -> Option<PartialProfile> {
        match self.remote.fetch_profile(&identity.email).await {
            Ok(Some(remote)) => Some(PartialProfile::from(remote)),
            Ok(None) => {
                tracing::debug!("No remote profile");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Remote profile unavailable, using local copy");
                None
            }
        }
    }

    /// [`Self::local`], then every field the remote profile carries.
    /// Remote failure keeps the local values.
    pub async fn load(&self, identity: &Identity) -> PartialProfile {
        let mut profile = self.local(identity);
        if let Some(remote) = self.fetch_remote(identity).await {
            profile.overlay(&remote);
        }
        profile
    }

    /// Save `profile` remotely, then keep a local copy. The email is always
    /// the identity's.
    pub async fn save(
        &self,
        identity: &Identity,
        profile: &PartialProfile,
    ) -> Result<PartialProfile, ProfileError> {
        let mut profile = profile.clone();
        profile.email = Some(identity.email.clone());

        self.remote
            .save_profile(&identity.email, &RemoteProfile::from(&profile))
            .await?;
        self.store.set_json(&profile_key(&identity.email), &profile)?;
        tracing::info!("Profile saved");
        Ok(profile)
    }

    /// Drop the local copy for `identity`. Returns whether one existed.
    pub fn evict(&self, identity: &Identity) -> Result<bool, DatabaseError> {
        self.store.remove(&profile_key(&identity.email))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MockRemote;

    fn ada() -> Identity {
        Identity::new("Ada", "ada@example.com")
    }

    fn cache(mock: MockRemote) -> (ProfileCache, Arc<MockRemote>, LocalStore) {
        let mock = Arc::new(mock);
        let store = LocalStore::open_in_memory().unwrap();
        (ProfileCache::new(store.view(), mock.clone()), mock, store)
    }

    #[tokio::test]
    async fn remote_fields_win_absent_fields_keep_local() {
        let remote = RemoteProfile {
            age: Some(52),
            med_cond: Some("Asthma".into()),
            ..Default::default()
        };
        let (cache, _, store) = cache(MockRemote::new().with_profile("ada@example.com", remote));
        let local = PartialProfile {
            age: Some(50),
            phone: Some("555-0100".into()),
            ..Default::default()
        };
        store.set_json(&profile_key("ada@example.com"), &local).unwrap();

        let merged = cache.load(&ada()).await;
        assert_eq!(merged.age, Some(52));
        assert_eq!(merged.medical_conditions.as_deref(), Some("Asthma"));
        assert_eq!(merged.phone.as_deref(), Some("555-0100"));
        assert_eq!(merged.name.as_deref(), Some("Ada"));
    }

    #[tokio::test]
    async fn remote_failure_keeps_local_silently() {
        let (cache, mock, store) = cache(MockRemote::new());
        mock.set_profile_error(Some(RemoteError::Timeout("slow".into())));
        let local = PartialProfile {
            age: Some(50),
            ..Default::default()
        };
        store.set_json(&profile_key("ada@example.com"), &local).unwrap();

        let merged = cache.load(&ada()).await;
        assert_eq!(merged.age, Some(50));
        assert_eq!(mock.profile_fetches(), 1);
    }

    #[tokio::test]
    async fn unreadable_local_copy_is_skipped() {
        let (cache, _, store) = cache(MockRemote::new());
        store.set(&profile_key("ada@example.com"), "{broken").unwrap();
        let merged = cache.load(&ada()).await;
        assert_eq!(merged.email.as_deref(), Some("ada@example.com"));
        assert!(merged.age.is_none());
    }

    #[test]
    fn local_snapshot_skips_remote() {
        let (cache, mock, store) = cache(MockRemote::new());
        let local = PartialProfile {
            age: Some(50),
            ..Default::default()
        };
        store.set_json(&profile_key("ada@example.com"), &local).unwrap();

        let profile = cache.local(&ada());
        assert_eq!(profile.age, Some(50));
        assert_eq!(profile.name.as_deref(), Some("Ada"));
        assert_eq!(mock.profile_fetches(), 0);
    }

    #[tokio::test]
    async fn fetch_remote_is_none_on_failure() {
        let (cache, mock, _) = cache(MockRemote::new());
        mock.set_profile_error(Some(RemoteError::Connection("x".into())));
        assert!(cache.fetch_remote(&ada()).await.is_none());
    }

    #[tokio::test]
    async fn save_puts_remote_then_caches_locally() {
        let (cache, mock, _) = cache(MockRemote::new());
        let profile = PartialProfile {
            email: Some("someone-else@example.com".into()),
            age: Some(40),
            gender: Some("female".into()),
            ..Default::default()
        };

        let saved = cache.save(&ada(), &profile).await.unwrap();
        assert_eq!(saved.email.as_deref(), Some("ada@example.com"));

        let remote = mock.saved_profiles();
        assert_eq!(remote[0].0, "ada@example.com");
        assert_eq!(remote[0].1.age, Some(40));
        assert_eq!(cache.cached(&ada()).unwrap(), Some(saved));
    }

    #[tokio::test]
    async fn failed_save_leaves_cache_untouched() {
        let (cache, mock, _) = cache(MockRemote::new());
        mock.set_profile_error(Some(RemoteError::Status { status: 500, body: String::new() }));
        let result = cache.save(&ada(), &PartialProfile::default()).await;
        assert!(matches!(result, Err(ProfileError::Remote(_))));
        assert_eq!(cache.cached(&ada()).unwrap(), None);
    }

    #[tokio::test]
    async fn evict_only_touches_that_identity() {
        let (cache, _, store) = cache(MockRemote::new());
        let bob = Identity::new("Bob", "bob@example.com");
        store.set_json(&profile_key("ada@example.com"), &PartialProfile::default()).unwrap();
        store.set_json(&profile_key("bob@example.com"), &PartialProfile::default()).unwrap();

        assert!(cache.evict(&ada()).unwrap());
        assert!(cache.cached(&ada()).unwrap().is_none());
        assert!(cache.cached(&bob).unwrap().is_some());
    }
}
