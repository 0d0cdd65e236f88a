//! Identity claims carried by bearer tokens.
//!
//! Token issuance lives in the identity service; this crate only needs the
//! claim shape to identify the acting user and their tenant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT claims for access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID).
    pub sub: Uuid,
    /// Tenant the user is acting in.
    pub tenant: Uuid,
    /// User's role within the tenant.
    pub role: String,
    /// Display name, recorded in the approval history.
    pub name: String,
    /// Email address, recorded in the approval history.
    pub email: String,
    /// Issued at timestamp.
    pub iat: i64,
    /// Expiration timestamp.
    pub exp: i64,
}

/// Identity fields used to mint [`Claims`].
#[derive(Debug, Clone)]
pub struct Identity {
    /// User ID.
    pub user_id: Uuid,
    /// Tenant ID.
    pub tenant_id: Uuid,
    /// Role name.
    pub role: String,
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
}

impl Claims {
    /// Creates new claims for an identity.
    #[must_use]
    pub fn new(identity: &Identity, expires_at: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            sub: identity.user_id,
            tenant: identity.tenant_id,
            role: identity.role.clone(),
            name: identity.name.clone(),
            email: identity.email.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        }
    }

    /// Returns the user ID from claims.
    #[must_use]
    pub const fn user_id(&self) -> Uuid {
        self.sub
    }

    /// Returns the tenant ID from claims.
    #[must_use]
    pub const fn tenant_id(&self) -> Uuid {
        self.tenant
    }
}
