use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::common::{PhoneNumber, Username};
use crate::domains::auth::models::IdentityId;
use crate::domains::profile::models::ProfileRecord;
use crate::kernel::{BaseProfileRepository, ProfileField, RepositoryError};

/// Process-local profile store, used when no database is configured.
///
/// Enforces the same uniqueness rules as the `profiles` table.
#[derive(Default)]
pub struct InMemoryProfileRepository {
    profiles: RwLock<HashMap<IdentityId, ProfileRecord>>,
}

impl InMemoryProfileRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record as-is, replacing any record for the same identity
    pub async fn insert(&self, record: ProfileRecord) {
        self.profiles
            .write()
            .await
            .insert(record.identity_id.clone(), record);
    }

    pub async fn len(&self) -> usize {
        self.profiles.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.profiles.read().await.is_empty()
    }
}

#[async_trait]
impl BaseProfileRepository for InMemoryProfileRepository {
    async fn is_username_taken(&self, username: &Username) -> Result<bool, RepositoryError> {
        let profiles = self.profiles.read().await;
        Ok(profiles.values().any(|p| p.username == username.as_str()))
    }

    async fn is_phone_registered(&self, phone: &PhoneNumber) -> Result<bool, RepositoryError> {
        let profiles = self.profiles.read().await;
        Ok(profiles.values().any(|p| &p.phone_number == phone))
    }

    async fn find_by_phone(
        &self,
        phone: &PhoneNumber,
    ) -> Result<Option<ProfileRecord>, RepositoryError> {
        let profiles = self.profiles.read().await;
        Ok(profiles.values().find(|p| &p.phone_number == phone).cloned())
    }

    async fn create_profile(
        &self,
        identity_id: &IdentityId,
        username: &Username,
        phone: &PhoneNumber,
    ) -> Result<ProfileRecord, RepositoryError> {
        let mut profiles = self.profiles.write().await;

        if profiles.contains_key(identity_id) {
            return Err(RepositoryError::WriteConflict {
                identity_id: identity_id.clone(),
            });
        }
        if profiles.values().any(|p| p.username == username.as_str()) {
            return Err(RepositoryError::Duplicate {
                field: ProfileField::Username,
            });
        }
        if profiles.values().any(|p| &p.phone_number == phone) {
            return Err(RepositoryError::Duplicate {
                field: ProfileField::PhoneNumber,
            });
        }

        let record = ProfileRecord::new_rider(identity_id.clone(), username, phone);
        profiles.insert(identity_id.clone(), record.clone());
        Ok(record)
    }

    async fn fetch_profile(
        &self,
        identity_id: &IdentityId,
    ) -> Result<Option<ProfileRecord>, RepositoryError> {
        Ok(self.profiles.read().await.get(identity_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phone(local: &str) -> PhoneNumber {
        PhoneNumber::from_local("94", local).unwrap()
    }

    #[tokio::test]
    async fn test_create_then_fetch() {
        let repo = InMemoryProfileRepository::new();
        let id = IdentityId::new("id-1");
        let username = Username::parse("rid").unwrap();

        let created = repo
            .create_profile(&id, &username, &phone("0771234567"))
            .await
            .unwrap();
        let fetched = repo.fetch_profile(&id).await.unwrap();

        assert_eq!(fetched, Some(created));
        assert!(repo.is_username_taken(&username).await.unwrap());
        assert!(repo
            .is_phone_registered(&phone("0771234567"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_second_create_for_same_identity_conflicts() {
        let repo = InMemoryProfileRepository::new();
        let id = IdentityId::new("id-1");
        let username = Username::parse("rid").unwrap();

        repo.create_profile(&id, &username, &phone("0771234567"))
            .await
            .unwrap();
        let second = repo
            .create_profile(&id, &username, &phone("0771234567"))
            .await;

        assert!(matches!(second, Err(RepositoryError::WriteConflict { .. })));
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_duplicate_username_for_other_identity() {
        let repo = InMemoryProfileRepository::new();
        let username = Username::parse("rid").unwrap();

        repo.create_profile(&IdentityId::new("id-1"), &username, &phone("0771234567"))
            .await
            .unwrap();
        let result = repo
            .create_profile(&IdentityId::new("id-2"), &username, &phone("0779999999"))
            .await;

        assert!(matches!(
            result,
            Err(RepositoryError::Duplicate {
                field: ProfileField::Username
            })
        ));
    }

    #[tokio::test]
    async fn test_find_by_phone() {
        let repo = InMemoryProfileRepository::new();
        assert!(repo
            .find_by_phone(&phone("0771234567"))
            .await
            .unwrap()
            .is_none());

        repo.create_profile(
            &IdentityId::new("id-1"),
            &Username::parse("rid").unwrap(),
            &phone("0771234567"),
        )
        .await
        .unwrap();

        let found = repo.find_by_phone(&phone("0771234567")).await.unwrap();
        assert_eq!(found.map(|p| p.username), Some("rid".to_string()));
    }
}
