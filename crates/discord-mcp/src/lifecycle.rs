//! Lifecycle & Readiness
//!
//! [`Readiness`] is the once-written flag that gates every Discord-backed
//! request. [`Coordinator`] owns the platform client and the bridge server,
//! logs in, waits for readiness and only then attaches a transport.

use crate::server::{BridgeServer, ServerInfo};
use crate::transport::Transport;
use anyhow::{anyhow, Result};
use discord_platform::{Platform, User};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// One-shot readiness signal. Starts false, flips to true once, never resets.
#[derive(Clone)]
pub struct Readiness {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for Readiness {
    fn default() -> Self {
        Self::new()
    }
}

impl Readiness {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Returns true only for the call that performed the transition.
    pub fn mark_ready(&self) -> bool {
        self.tx.send_if_modified(|ready| {
            if *ready {
                false
            } else {
                *ready = true;
                true
            }
        })
    }

    pub fn is_ready(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once ready; immediately if already ready.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in self, so the channel cannot close here.
        let _ = rx.wait_for(|ready| *ready).await;
    }
}

pub struct Coordinator {
    platform: Arc<dyn Platform>,
    readiness: Readiness,
    server: Arc<BridgeServer>,
}

impl Coordinator {
    pub fn new(platform: Arc<dyn Platform>, info: ServerInfo) -> Self {
        let readiness = Readiness::new();
        let server = Arc::new(BridgeServer::new(
            info,
            Arc::clone(&platform),
            readiness.clone(),
        ));
        Self {
            platform,
            readiness,
            server,
        }
    }

    pub fn server(&self) -> Arc<BridgeServer> {
        Arc::clone(&self.server)
    }

    pub fn readiness(&self) -> Readiness {
        self.readiness.clone()
    }

    /// Start the Discord login in the background. The readiness flag is set
    /// when the session reports ready.
    pub fn initiate_login(&self) -> JoinHandle<discord_platform::Result<User>> {
        let platform = Arc::clone(&self.platform);
        let readiness = self.readiness.clone();

        tokio::spawn(async move {
            let user = platform.login().await?;
            info!(user = %user.username, id = %user.id, "Logged in as {}", user.username);
            readiness.mark_ready();
            Ok(user)
        })
    }

    /// Wait until the session is ready. A failed login is returned as an
    /// error; there is no retry.
    pub async fn await_readiness(
        &self,
        mut login: JoinHandle<discord_platform::Result<User>>,
    ) -> Result<()> {
        tokio::select! {
            biased;
            _ = self.readiness.wait() => Ok(()),
            joined = &mut login => match joined {
                Ok(Ok(_)) => {
                    self.readiness.wait().await;
                    Ok(())
                }
                Ok(Err(e)) => {
                    error!(error = %e, "Discord login failed");
                    Err(anyhow!("Discord login failed: {}", e))
                }
                Err(e) => Err(anyhow!("Discord login task aborted: {}", e)),
            },
        }
    }

    /// Log in, wait for readiness, then serve the transport until it closes.
    pub async fn run<T: Transport>(self, transport: T) -> Result<()> {
        let login = self.initiate_login();
        self.await_readiness(login).await?;
        transport.serve(self.server()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_single_transition() {
        let readiness = Readiness::new();
        assert!(!readiness.is_ready());
        assert!(readiness.mark_ready());
        assert!(!readiness.mark_ready());
        assert!(readiness.is_ready());
    }

    #[tokio::test]
    async fn test_wait_releases_pending_waiter() {
        let readiness = Readiness::new();
        let waiter = {
            let readiness = readiness.clone();
            tokio::spawn(async move { readiness.wait().await })
        };

        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        readiness.mark_ready();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();

        // Later waits resolve immediately
        tokio::time::timeout(Duration::from_millis(10), readiness.wait())
            .await
            .unwrap();
    }
}
