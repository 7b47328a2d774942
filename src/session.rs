//! Sessions: expiring, revocable bearers of a permission set.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::VaultError;
use crate::permissions::Permission;
use crate::storage::HasId;

pub const DEFAULT_SESSION_MAX_AGE_SECS: u64 = 3600;

/// Authorization token minted by the teller. Transitions only forward:
/// valid -> invalidated (terminal) or valid -> expired (time-based).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub permissions: Vec<Permission>,
    /// Lifetime in seconds. 0 = never expires.
    pub max_age_secs: u64,
    /// UNIX timestamp (ms) of issuance.
    pub issued_at_ms: i64,
    /// UNIX timestamp (ms) of invalidation, set exactly once.
    pub invalidated_at_ms: Option<i64>,
    pub origin: Option<String>,
}

impl Session {
    pub fn new(
        permissions: Vec<Permission>,
        max_age_secs: Option<i64>,
        origin: Option<String>,
    ) -> Result<Self, VaultError> {
        let max_age_secs = match max_age_secs {
            Some(age) if age < 0 => {
                return Err(VaultError::Argument("session maxAge cannot be negative".to_string()))
            }
            Some(age) => age as u64,
            None => DEFAULT_SESSION_MAX_AGE_SECS,
        };

        Ok(Session {
            id: Uuid::new_v4().to_string(),
            permissions,
            max_age_secs,
            issued_at_ms: Utc::now().timestamp_millis(),
            invalidated_at_ms: None,
            origin,
        })
    }

    /// Pure validity check at an arbitrary instant.
    pub fn is_valid_at(&self, now_ms: i64) -> bool {
        if self.invalidated_at_ms.is_some() {
            return false;
        }
        if self.max_age_secs == 0 {
            return true;
        }
        now_ms < self.issued_at_ms + (self.max_age_secs as i64) * 1000
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now().timestamp_millis())
    }

    /// Invalidate the session. Idempotent: the first timestamp sticks.
    pub fn invalidate(&mut self) {
        if self.invalidated_at_ms.is_none() {
            self.invalidated_at_ms = Some(Utc::now().timestamp_millis());
        }
    }

    /// Whether this session permits `action` on `resource`, optionally
    /// scoped to a specific identity.
    pub fn includes(&self, resource: &str, action: &str, identity: Option<&str>) -> bool {
        self.permissions
            .iter()
            .filter(|p| p.resource == resource && p.action == action)
            .any(|p| match identity {
                Some(id) => p.covers_identity(id),
                None => true,
            })
    }

    pub fn serialize(&self) -> Result<String, VaultError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn deserialize(data: &str) -> Result<Self, VaultError> {
        Ok(serde_json::from_str(data)?)
    }
}

impl HasId for Session {
    fn record_id(&self) -> &str {
        &self.id
    }
}

/// A pending grant request from an external origin (a website, the
/// extension UI). On success the minted session is additionally granted
/// `session:revoke` on itself unless `grants_revoke_permission` is false.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ExternalAccessRequest {
    pub permissions: Vec<Permission>,
    pub max_age_secs: Option<i64>,
    pub origin: Option<String>,
    #[serde(default)]
    pub account_ids: Vec<String>,
    #[serde(default = "default_grants_revoke")]
    pub grants_revoke_permission: bool,
}

fn default_grants_revoke() -> bool {
    true
}

impl ExternalAccessRequest {
    pub fn validate(&self) -> Result<(), VaultError> {
        if self.permissions.is_empty() {
            return Err(VaultError::Argument(
                "external access request must carry at least one permission".to_string(),
            ));
        }
        Ok(())
    }
}
