//! Page-fetching collaborator.
//!
//! A [`Browser`] launches a [`PageSession`]; one ingestion run owns one
//! session exclusively (`&mut self` on every load) and must close it on
//! every exit path. Text and link extraction over the returned
//! [`FetchedPage`] is done by the app crate.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::FetchedPage;

/// Launches browsing sessions.
#[async_trait]
pub trait Browser: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn PageSession>>;
}

/// A live browsing session.
#[async_trait]
pub trait PageSession: Send {
    /// Navigate to `url`, failing if it takes longer than `timeout`.
    async fn load(&mut self, url: &str, timeout: Duration) -> Result<FetchedPage>;

    /// Release the session.
    async fn close(self: Box<Self>) -> Result<()>;
}
