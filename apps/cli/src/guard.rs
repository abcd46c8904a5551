//! Preflight checks shared by authenticated commands.

use crate::http::ClientError;
use crate::session::SessionStore;

/// Commands that talk to protected routes bail out early with a hint
/// instead of burning a request on a guaranteed 401.
pub fn require_auth(session: &SessionStore) -> Result<(), ClientError> {
    if session.is_authenticated() {
        Ok(())
    } else {
        Err(ClientError::Unauthenticated)
    }
}

/// Returns the cached CV id or tells the user to upload one.
pub fn require_cv(session: &SessionStore) -> Result<String, ClientError> {
    session.last_cv_id().ok_or(ClientError::CvRequired)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_auth_needs_an_access_token() {
        let session = SessionStore::in_memory();
        assert!(matches!(
            require_auth(&session),
            Err(ClientError::Unauthenticated)
        ));

        session.set_token_pair("a", "r").unwrap();
        assert!(require_auth(&session).is_ok());
    }

    #[test]
    fn test_require_cv_returns_cached_id() {
        let session = SessionStore::in_memory();
        assert!(matches!(require_cv(&session), Err(ClientError::CvRequired)));

        session.set_last_cv_id("cv-3").unwrap();
        assert_eq!(require_cv(&session).unwrap(), "cv-3");
    }
}
