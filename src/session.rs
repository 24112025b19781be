//! Session guard
//!
//! Consulted before every page audit. The login protocol itself lives in the
//! implementation; the scheduler only needs to know whether it may proceed.

use async_trait::async_trait;
use thiserror::Error;

/// Reasons a session could not be established
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Login failed: {0}")]
    LoginFailed(String),

    #[error("Session expired and could not be renewed: {0}")]
    Expired(String),
}

/// Ensures an authenticated session before each audit
#[async_trait]
pub trait SessionGuard: Send + Sync {
    async fn ensure_logged_in(&self) -> Result<(), SessionError>;
}

/// Guard for targets that need no authentication
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSession;

#[async_trait]
impl SessionGuard for NoSession {
    async fn ensure_logged_in(&self) -> Result<(), SessionError> {
        Ok(())
    }
}
