//! Application user records and the backend fetch capability.

use crate::auth::ExternalIdentity;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Profile record served by the application backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRecord {
    /// Backend user id.
    pub id: String,
    /// Whether the user bought into the early access program.
    #[serde(default)]
    pub early_access: bool,
    /// Whether the user opted into degen mode.
    #[serde(default)]
    pub degen_mode: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
    /// Backend fields this client does not interpret, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProfileRecord {
    /// A fresh record with no program flags, stamped now.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            early_access: false,
            degen_mode: false,
            created_at: now,
            updated_at: now,
            extra: Map::new(),
        }
    }
}

/// Backend profile merged with the identity it was fetched for.
///
/// Only valid while `identity.id` matches the signed-in identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationUser {
    /// Backend profile fields.
    #[serde(flatten)]
    pub profile: ProfileRecord,
    /// Identity the profile belongs to.
    pub identity: ExternalIdentity,
}

impl ApplicationUser {
    /// Merge a backend profile with the identity it was fetched for.
    #[must_use]
    pub fn new(profile: ProfileRecord, identity: ExternalIdentity) -> Self {
        Self { profile, identity }
    }

    /// Identity id this record is keyed by.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.identity.id
    }

    /// Whether this record may be served for `identity`.
    #[must_use]
    pub fn belongs_to(&self, identity: &ExternalIdentity) -> bool {
        self.identity.id == identity.id
    }
}

/// Remote capability returning the backend profile of the signed-in user.
#[async_trait]
pub trait BackendUserFetch: Send + Sync {
    /// Fetch the profile for `identity`.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or when the backend reports one.
    async fn fetch_profile(&self, identity: &ExternalIdentity) -> Result<ProfileRecord>;
}
