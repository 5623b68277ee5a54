//! Browser session lifecycle.
//!
//! A [`Browser`] launches a [`PageDriver`]; the collector keeps it in a
//! [`SessionState`] that is either `Closed` or `Open` with a live handle.
//! Collecting against a closed session is a precondition error.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::extract::PageSnapshot;
use crate::error::{Error, Result};

/// One page that can be pointed at a directions URL.
#[async_trait]
pub trait PageDriver: Send {
    /// Loads `url` and returns what the page exposed once it settled.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> anyhow::Result<PageSnapshot>;

    /// Drops responses captured for the previous navigation.
    fn clear_captured(&mut self);

    async fn shutdown(self: Box<Self>) -> anyhow::Result<()>;
}

#[async_trait]
pub trait Browser: Send + Sync {
    async fn launch(&self) -> anyhow::Result<Box<dyn PageDriver>>;
}

/// A launched page plus bookkeeping for the run summary.
pub struct SessionHandle {
    driver: Box<dyn PageDriver>,
    opened_at: Instant,
    pub navigations: usize,
}

impl SessionHandle {
    pub async fn open<B: Browser + ?Sized>(browser: &B) -> Result<Self> {
        let driver = browser
            .launch()
            .await
            .map_err(|e| Error::Launch(format!("{e:#}")))?;
        info!("Browser session opened");
        Ok(Self {
            driver,
            opened_at: Instant::now(),
            navigations: 0,
        })
    }

    /// Clears per-page state, then navigates.
    pub async fn load(&mut self, url: &str, timeout: Duration) -> anyhow::Result<PageSnapshot> {
        self.driver.clear_captured();
        self.navigations += 1;
        self.driver.navigate(url, timeout).await
    }

    pub async fn close(self) {
        let uptime = self.opened_at.elapsed();
        match self.driver.shutdown().await {
            Ok(()) => info!(navigations = self.navigations, ?uptime, "Browser session closed"),
            Err(e) => warn!(error = %e, "Browser did not shut down cleanly"),
        }
    }
}

#[derive(Default)]
pub enum SessionState {
    #[default]
    Closed,
    Open(SessionHandle),
}

impl SessionState {
    pub fn is_open(&self) -> bool {
        matches!(self, SessionState::Open(_))
    }

    pub async fn open<B: Browser + ?Sized>(&mut self, browser: &B) -> Result<()> {
        if self.is_open() {
            debug!("Session already open");
            return Ok(());
        }
        *self = SessionState::Open(SessionHandle::open(browser).await?);
        Ok(())
    }

    pub fn handle(&mut self) -> Result<&mut SessionHandle> {
        match self {
            SessionState::Open(handle) => Ok(handle),
            SessionState::Closed => Err(Error::SessionClosed),
        }
    }

    pub async fn close(&mut self) {
        if let SessionState::Open(handle) = std::mem::take(self) {
            handle.close().await;
        }
    }
}
