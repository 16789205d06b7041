use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use reqwest::{Client, Url};
use tokio::process::Command;
use tokio::select;
use tokio::time::{Duration, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Cheap reachability check used before the show starts.
pub trait ConnectivityProbe: Send + Sync {
    fn is_connected(&self) -> BoxFuture<'_, bool>;
}

/// Any HTTP response from the probe URL counts as connected.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
    url: Url,
}

impl HttpProbe {
    pub fn new(client: Client, url: &str) -> Result<Self> {
        let url = Url::parse(url).with_context(|| format!("invalid probe url {url:?}"))?;
        Ok(Self { client, url })
    }
}

impl ConnectivityProbe for HttpProbe {
    fn is_connected(&self) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            match self.client.get(self.url.clone()).send().await {
                Ok(_) => true,
                Err(err) => {
                    debug!(url = %self.url, "connection check failed: {err}");
                    false
                }
            }
        })
    }
}

/// Startup barrier: wait for connectivity, then optionally resync the clock.
#[derive(Clone)]
pub struct Readiness {
    probe: Arc<dyn ConnectivityProbe>,
    probe_interval: Duration,
    clock_sync: Option<Vec<String>>,
}

impl Readiness {
    pub fn new(probe: Arc<dyn ConnectivityProbe>, probe_interval: Duration) -> Self {
        Self {
            probe,
            probe_interval,
            clock_sync: None,
        }
    }

    pub fn with_clock_sync(mut self, command: Vec<String>) -> Self {
        self.clock_sync = Some(command).filter(|argv| !argv.is_empty());
        self
    }

    /// Polls until the probe succeeds. There is no retry limit; only
    /// cancellation ends the wait early, in which case `None` is returned.
    pub async fn wait_for_connection(&self, cancel: &CancellationToken) -> Option<u32> {
        let mut checks = 1;
        loop {
            let connected = select! {
                _ = cancel.cancelled() => return None,
                connected = self.probe.is_connected() => connected,
            };
            if connected {
                info!(checks, "internet connection present");
                return Some(checks);
            }
            select! {
                _ = cancel.cancelled() => return None,
                _ = sleep(self.probe_interval) => {}
            }
            checks += 1;
        }
    }

    /// Runs the configured clock sync command. Failure is logged and ignored.
    pub async fn sync_clock(&self) {
        let Some((program, args)) = self.clock_sync.as_deref().and_then(|argv| argv.split_first())
        else {
            return;
        };
        match Command::new(program).args(args).status().await {
            Ok(status) if status.success() => info!(program, "clock synchronized"),
            Ok(status) => warn!(program, %status, "clock synchronization failed"),
            Err(err) => warn!(program, "clock synchronization failed: {err}"),
        }
    }
}

impl std::fmt::Debug for Readiness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Readiness")
            .field("probe_interval", &self.probe_interval)
            .field("clock_sync", &self.clock_sync)
            .finish_non_exhaustive()
    }
}
