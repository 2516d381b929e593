use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use bodega_core::{TenantId, UserId};

/// Privileged mutations that require a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Privilege {
    AdjustStock,
    DeleteProduct,
}

/// A server-issued, time-bounded authorization for one privilege within one
/// tenant.
///
/// This is the minimal set of claims the core expects once a grant has been
/// decoded/verified by whatever transport/security layer is in use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivilegeGrant {
    /// Actor the grant was issued to.
    pub actor: UserId,

    /// Tenant context for the grant.
    pub tenant_id: TenantId,

    /// The single privilege this grant covers.
    pub privilege: Privilege,

    /// Issued-at timestamp.
    pub issued_at: DateTime<Utc>,

    /// Expiration timestamp.
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GrantValidationError {
    #[error("grant has expired")]
    Expired,

    #[error("grant not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid grant time window (expires_at <= issued_at)")]
    InvalidTimeWindow,

    #[error("grant does not cover this tenant")]
    TenantMismatch,

    #[error("grant does not cover this privilege")]
    PrivilegeMismatch,
}

/// Deterministically validate a grant against the operation being attempted.
///
/// Note: this validates the *claims* only. Signature verification / decoding
/// is intentionally outside this crate.
pub fn validate_grant(
    grant: &PrivilegeGrant,
    tenant_id: TenantId,
    privilege: Privilege,
    now: DateTime<Utc>,
) -> Result<(), GrantValidationError> {
    if grant.expires_at <= grant.issued_at {
        return Err(GrantValidationError::InvalidTimeWindow);
    }
    if now < grant.issued_at {
        return Err(GrantValidationError::NotYetValid);
    }
    if now >= grant.expires_at {
        return Err(GrantValidationError::Expired);
    }
    if grant.tenant_id != tenant_id {
        return Err(GrantValidationError::TenantMismatch);
    }
    if grant.privilege != privilege {
        return Err(GrantValidationError::PrivilegeMismatch);
    }
    Ok(())
}
