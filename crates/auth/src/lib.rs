//! Authorization for privileged mutations.
//!
//! Privileged operations (manual stock adjustments, product deletion) are
//! gated by a server-issued, time-bounded grant rather than any cached
//! client-side "password verified" state. Issuing and signing grants is the
//! transport layer's concern; this crate validates them deterministically.

pub mod grant;

pub use grant::{GrantValidationError, Privilege, PrivilegeGrant, validate_grant};
