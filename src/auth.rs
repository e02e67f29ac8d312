use std::sync::Arc;

use crate::config::Credentials;
use crate::dnac::Controller;
use crate::error::{Error, Result};

/// Session owns the controller token.
///
/// There is no background refresh: callers decide when a token may have
/// expired and call `authenticate` again. Long batch loops do so once per
/// device.
pub struct Session<C: Controller> {
    controller: Arc<C>,
    credentials: Credentials,
    token: Option<String>,
    issued: u32,
}

impl<C: Controller> Session<C> {
    pub fn new(controller: Arc<C>, credentials: Credentials) -> Self {
        Self {
            controller,
            credentials,
            token: None,
            issued: 0,
        }
    }

    /// Request a fresh token, replacing the current one
    pub async fn authenticate(&mut self) -> Result<&str> {
        let token = self.controller.authenticate(&self.credentials).await?;
        self.issued += 1;
        tracing::debug!("Issued controller token #{}", self.issued);
        Ok(self.token.insert(token).as_str())
    }

    /// The current token; an error before the first `authenticate`
    pub fn token(&self) -> Result<&str> {
        self.token
            .as_deref()
            .ok_or_else(|| Error::Auth("session is not authenticated".into()))
    }

    pub fn controller(&self) -> &C {
        &self.controller
    }

    /// Number of tokens fetched over the session's lifetime
    pub fn tokens_issued(&self) -> u32 {
        self.issued
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dnac::fake::FakeController;

    fn creds(password: &str) -> Credentials {
        Credentials {
            username: "admin".into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn test_token_before_authenticate() {
        let session = Session::new(Arc::new(FakeController::new()), creds("secret"));
        assert!(matches!(session.token(), Err(Error::Auth(_))));
    }

    #[tokio::test]
    async fn test_authenticate_replaces_token() {
        let mut session = Session::new(Arc::new(FakeController::new()), creds("secret"));
        let first = session.authenticate().await.unwrap().to_string();
        let second = session.authenticate().await.unwrap().to_string();
        assert_ne!(first, second);
        assert_eq!(session.token().unwrap(), second);
        assert_eq!(session.tokens_issued(), 2);
    }

    #[tokio::test]
    async fn test_bad_credentials() {
        let fake = Arc::new(FakeController::new());
        let mut session = Session::new(fake.clone(), creds(""));
        let err = session.authenticate().await.unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(session.tokens_issued(), 0);
        assert_eq!(fake.with_state(|s| s.auth_calls), 1);
    }

    #[test]
    fn test_token_survives_failed_refresh() {
        let fake = Arc::new(FakeController::new());
        let mut session = Session::new(fake.clone(), creds("secret"));
        tokio_test::assert_ok!(tokio_test::block_on(session.authenticate()));

        fake.with_state(|s| s.reject_credentials = true);
        tokio_test::assert_err!(tokio_test::block_on(session.authenticate()));
        assert_eq!(session.token().unwrap(), "token-1");
        assert_eq!(session.tokens_issued(), 1);
    }
}
