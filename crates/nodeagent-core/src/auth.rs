//! # Authenticator
//!
//! Checks the `Username`/`Password` headers against the credential store.
//!
//! Every outcome is written to the `nodeagent::audit` log target. On a
//! password mismatch the audit record names both the submitted and the
//! expected password; unless cleartext logging is switched on these are
//! replaced by the first 8 hex digits of their SHA-256 digest, which is
//! enough to tell "wrong password" from "stale password" without writing
//! secrets to disk.
//!
//! The comparison is a plain string equality, not constant time.

use std::sync::Arc;

use nodeagent_store::CredentialStore;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::error::AuthError;
use crate::headers::RequestHeaders;

/// Log target of authentication audit records.
pub const AUDIT_TARGET: &str = "nodeagent::audit";

const FINGERPRINT_LEN: usize = 8;

/// Validates inbound credentials.
#[derive(Debug, Clone)]
pub struct Authenticator {
    credentials: Arc<CredentialStore>,
    log_cleartext_passwords: bool,
}

impl Authenticator {
    /// Creates an authenticator over `credentials`.
    pub fn new(credentials: Arc<CredentialStore>, log_cleartext_passwords: bool) -> Self {
        Self {
            credentials,
            log_cleartext_passwords,
        }
    }

    /// Returns the caller's user name, exactly as supplied.
    ///
    /// # Errors
    ///
    /// Fails if either header is missing, the user is unknown, or the
    /// password does not match.
    pub fn authenticate(&self, headers: &RequestHeaders) -> Result<String, AuthError> {
        let Some(username) = headers.username() else {
            warn!(target: AUDIT_TARGET, "authentication failed: no username header");
            return Err(AuthError::MissingUsername);
        };
        let Some(password) = headers.password() else {
            warn!(target: AUDIT_TARGET, user = %username, "authentication failed: no password header");
            return Err(AuthError::MissingPassword(username.to_string()));
        };
        let Some(expected) = self.credentials.password_for(username) else {
            warn!(target: AUDIT_TARGET, user = %username, "authentication failed: unknown user");
            return Err(AuthError::UnknownUser(username.to_string()));
        };

        if password != expected {
            warn!(
                target: AUDIT_TARGET,
                user = %username,
                submitted = %self.redact(password),
                expected = %self.redact(expected),
                "authentication failed: password mismatch"
            );
            return Err(AuthError::BadPassword(username.to_string()));
        }

        info!(target: AUDIT_TARGET, user = %username, "authentication succeeded");
        Ok(username.to_string())
    }

    fn redact(&self, password: &str) -> String {
        if self.log_cleartext_passwords {
            password.to_string()
        } else {
            format!("sha256:{}", fingerprint(password))
        }
    }
}

/// Short hex fingerprint of a secret, for logs.
pub fn fingerprint(secret: &str) -> String {
    let digest = Sha256::digest(secret.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(FINGERPRINT_LEN);
    hex
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authenticator() -> Authenticator {
        let store = CredentialStore::new([("alice", "secret"), ("bob", "builder")]);
        Authenticator::new(Arc::new(store), false)
    }

    #[test]
    fn test_valid_credentials_return_username() {
        let auth = authenticator();
        for (user, pass) in [("alice", "secret"), ("bob", "builder")] {
            let headers = RequestHeaders::with_credentials(user, pass);
            assert_eq!(auth.authenticate(&headers).unwrap(), user);
        }
    }

    #[test]
    fn test_missing_username() {
        let headers: RequestHeaders = [("Password", "secret")].into_iter().collect();
        assert_eq!(
            authenticator().authenticate(&headers).unwrap_err(),
            AuthError::MissingUsername
        );
    }

    #[test]
    fn test_missing_password() {
        let headers: RequestHeaders = [("Username", "alice")].into_iter().collect();
        assert_eq!(
            authenticator().authenticate(&headers).unwrap_err(),
            AuthError::MissingPassword("alice".to_string())
        );
    }

    #[test]
    fn test_unknown_user() {
        let headers = RequestHeaders::with_credentials("mallory", "secret");
        assert_eq!(
            authenticator().authenticate(&headers).unwrap_err(),
            AuthError::UnknownUser("mallory".to_string())
        );
    }

    #[test]
    fn test_wrong_password() {
        let auth = authenticator();
        for pass in ["Secret", "secret ", "", "builder"] {
            let headers = RequestHeaders::with_credentials("alice", pass);
            assert_eq!(
                auth.authenticate(&headers).unwrap_err(),
                AuthError::BadPassword("alice".to_string())
            );
        }
    }

    #[test]
    fn test_fingerprint_is_short_and_stable() {
        let a = fingerprint("secret");
        assert_eq!(a.len(), 8);
        assert_eq!(a, fingerprint("secret"));
        assert_ne!(a, fingerprint("secret2"));
        // SHA-256("secret") = 2bb80d53...
        assert_eq!(a, "2bb80d53");
    }

    #[test]
    fn test_redaction_modes() {
        let store = Arc::new(CredentialStore::new([("alice", "secret")]));
        assert_eq!(Authenticator::new(store.clone(), true).redact("pw"), "pw");
        assert!(Authenticator::new(store, false)
            .redact("pw")
            .starts_with("sha256:"));
    }
}
