//! Prepare-for-write step.
//!
//! Every write goes through [`prepare_for_write`] before it reaches a
//! repository. The password change is consumed here, so it is hashed at
//! most once per write, and a write whose password did not change never
//! touches the hasher.

use std::fmt;

use tracing::{debug, error};
use zeroize::Zeroizing;

use super::error::UserResult;
use super::password::{HashError, PasswordHasher};
use super::types::UserRecord;

/// Whether this write modifies the password.
pub enum PasswordChange {
    Unchanged,
    Changed(Zeroizing<String>),
}

impl PasswordChange {
    pub fn changed(plaintext: impl Into<String>) -> Self {
        Self::Changed(Zeroizing::new(plaintext.into()))
    }

    pub const fn is_changed(&self) -> bool {
        matches!(self, Self::Changed(_))
    }
}

impl fmt::Debug for PasswordChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unchanged => f.write_str("Unchanged"),
            Self::Changed(_) => f.write_str("Changed([redacted])"),
        }
    }
}

/// A record ready for storage.
///
/// `password_hash` is `None` when the stored hash must be left as is.
#[derive(Clone)]
pub struct PreparedWrite {
    pub record: UserRecord,
    pub password_hash: Option<String>,
}

impl PreparedWrite {
    /// Write that leaves the stored password untouched.
    pub const fn without_password(record: UserRecord) -> Self {
        Self {
            record,
            password_hash: None,
        }
    }
}

impl fmt::Debug for PreparedWrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedWrite")
            .field("record", &self.record)
            .field("password_hash", &self.password_hash.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

/// Hash a changed password and pair it with the record.
///
/// On hashing failure nothing is returned that could be persisted.
pub async fn prepare_for_write<H: PasswordHasher>(
    hasher: &H,
    record: UserRecord,
    password: PasswordChange,
) -> UserResult<PreparedWrite> {
    let plaintext = match password {
        PasswordChange::Unchanged => return Ok(PreparedWrite::without_password(record)),
        PasswordChange::Changed(plaintext) => plaintext,
    };

    let hash = hasher.hash(&plaintext).await.map_err(|e| {
        error!(user_id = %record.id, error = %e, "Password hashing failed, write aborted");
        e
    })?;

    if hash.as_str() == plaintext.as_str() {
        error!(user_id = %record.id, "Password hasher returned plaintext, write aborted");
        return Err(HashError::PlaintextEcho.into());
    }

    debug!(user_id = %record.id, "Password hashed for write");
    Ok(PreparedWrite {
        record,
        password_hash: Some(hash),
    })
}
