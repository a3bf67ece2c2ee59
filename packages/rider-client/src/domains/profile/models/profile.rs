use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::fmt;
use std::str::FromStr;

use crate::common::{PhoneNumber, Username};
use crate::domains::auth::models::IdentityId;
use crate::kernel::{BaseProfileRepository, ProfileField, RepositoryError};

/// Account role. Riders are the only role the client creates today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileRole {
    Rider,
}

impl ProfileRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileRole::Rider => "rider",
        }
    }
}

impl fmt::Display for ProfileRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rider" => Ok(ProfileRole::Rider),
            other => Err(anyhow!("unknown profile role: {other}")),
        }
    }
}

/// Profile record keyed by identity id; created once per identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub identity_id: IdentityId,
    pub username: String,
    pub phone_number: PhoneNumber,
    pub role: ProfileRole,
    pub created_at: DateTime<Utc>,
}

impl ProfileRecord {
    pub fn new_rider(identity_id: IdentityId, username: &Username, phone: &PhoneNumber) -> Self {
        Self {
            identity_id,
            username: username.as_str().to_string(),
            phone_number: phone.clone(),
            role: ProfileRole::Rider,
            created_at: Utc::now(),
        }
    }
}

/// Row shape of the `profiles` table
#[derive(Debug, Clone, sqlx::FromRow)]
struct ProfileRow {
    identity_id: String,
    username: String,
    phone_number: String,
    role: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProfileRow> for ProfileRecord {
    type Error = RepositoryError;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        let phone_number = PhoneNumber::from_e164(&row.phone_number)
            .map_err(|e| RepositoryError::Unavailable(anyhow!("corrupt phone number: {e}")))?;
        let role = row.role.parse().map_err(RepositoryError::Unavailable)?;
        Ok(Self {
            identity_id: IdentityId::new(row.identity_id),
            username: row.username,
            phone_number,
            role,
            created_at: row.created_at,
        })
    }
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

/// Profile repository backed by the Postgres `profiles` table
#[derive(Clone)]
pub struct PgProfileRepository {
    pool: PgPool,
}

impl PgProfileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the bundled migrations
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn map_sqlx(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return match db.constraint() {
                Some("profiles_username_key") => RepositoryError::Duplicate {
                    field: ProfileField::Username,
                },
                Some("profiles_phone_number_key") => RepositoryError::Duplicate {
                    field: ProfileField::PhoneNumber,
                },
                _ => RepositoryError::Unavailable(err.into()),
            };
        }
    }
    RepositoryError::Unavailable(err.into())
}

#[async_trait]
impl BaseProfileRepository for PgProfileRepository {
    async fn is_username_taken(&self, username: &Username) -> Result<bool, RepositoryError> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM profiles WHERE username = $1)")
            .bind(username.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)
    }

    async fn is_phone_registered(&self, phone: &PhoneNumber) -> Result<bool, RepositoryError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM profiles WHERE phone_number = $1)",
        )
        .bind(phone.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)
    }

    async fn find_by_phone(
        &self,
        phone: &PhoneNumber,
    ) -> Result<Option<ProfileRecord>, RepositoryError> {
        let row = sqlx::query_as::<_, ProfileRow>("SELECT * FROM profiles WHERE phone_number = $1")
            .bind(phone.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        row.map(ProfileRecord::try_from).transpose()
    }

    async fn create_profile(
        &self,
        identity_id: &IdentityId,
        username: &Username,
        phone: &PhoneNumber,
    ) -> Result<ProfileRecord, RepositoryError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            INSERT INTO profiles (identity_id, username, phone_number, role)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (identity_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(identity_id.as_str())
        .bind(username.as_str())
        .bind(phone.as_str())
        .bind(ProfileRole::Rider.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        match row {
            Some(row) => row.try_into(),
            None => Err(RepositoryError::WriteConflict {
                identity_id: identity_id.clone(),
            }),
        }
    }

    async fn fetch_profile(
        &self,
        identity_id: &IdentityId,
    ) -> Result<Option<ProfileRecord>, RepositoryError> {
        let row = sqlx::query_as::<_, ProfileRow>("SELECT * FROM profiles WHERE identity_id = $1")
            .bind(identity_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        row.map(ProfileRecord::try_from).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_through_text() {
        assert_eq!("rider".parse::<ProfileRole>().unwrap(), ProfileRole::Rider);
        assert_eq!(ProfileRole::Rider.to_string(), "rider");
        assert!("driver".parse::<ProfileRole>().is_err());
    }

    #[test]
    fn test_row_conversion_rejects_unknown_role() {
        let row = ProfileRow {
            identity_id: "abc".to_string(),
            username: "rid".to_string(),
            phone_number: "+94771234567".to_string(),
            role: "admin".to_string(),
            created_at: Utc::now(),
        };
        assert!(ProfileRecord::try_from(row).is_err());
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&ProfileRole::Rider).unwrap();
        assert_eq!(json, "\"rider\"");
    }
}
