//! Readiness polling.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use localnet_transport::RpcClient;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::launcher::RunningValidator;
use crate::error::ValidatorStartError;

/// Answers whether the validator's RPC endpoint is serving.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn is_healthy(&self, rpc_url: &str) -> bool;
}

/// [`HealthProbe`] calling `getHealth`.
#[derive(Debug, Clone)]
pub struct RpcHealthProbe {
    timeout: Duration,
}

impl RpcHealthProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for RpcHealthProbe {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

#[async_trait]
impl HealthProbe for RpcHealthProbe {
    async fn is_healthy(&self, rpc_url: &str) -> bool {
        let client = RpcClient::with_timeouts(rpc_url, self.timeout, self.timeout);
        match tokio::task::spawn_blocking(move || client.get_health()).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                debug!(rpc_url, error = %e, "validator not healthy yet");
                false
            }
            Err(_) => false,
        }
    }
}

/// Poll until healthy, the process exits, the timeout elapses or the run is
/// cancelled.
pub async fn wait_until_ready(
    probe: &dyn HealthProbe,
    process: &mut dyn RunningValidator,
    rpc_url: &str,
    timeout: Duration,
    poll: Duration,
    log: &std::path::Path,
    cancel: &CancellationToken,
) -> Result<(), ValidatorStartError> {
    let started = Instant::now();
    loop {
        if cancel.is_cancelled() {
            return Err(ValidatorStartError::Cancelled);
        }
        if let Some(status) = process.try_exited() {
            return Err(ValidatorStartError::ExitedBeforeReady {
                status,
                log: log.to_path_buf(),
            });
        }

        let check = tokio::time::timeout(poll.max(Duration::from_secs(1)), probe.is_healthy(rpc_url));
        let healthy = tokio::select! {
            r = check => r.unwrap_or(false),
            _ = cancel.cancelled() => return Err(ValidatorStartError::Cancelled),
        };
        if healthy {
            info!(rpc_url, pid = process.pid(), waited_ms = started.elapsed().as_millis() as u64, "validator ready");
            return Ok(());
        }

        if started.elapsed() >= timeout {
            return Err(ValidatorStartError::ReadinessTimeout {
                url: rpc_url.to_string(),
                waited_secs: started.elapsed().as_secs(),
            });
        }
        tokio::select! {
            _ = tokio::time::sleep(poll) => {}
            _ = cancel.cancelled() => return Err(ValidatorStartError::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct HealthyAfter {
        polls: AtomicUsize,
        after: usize,
    }

    #[async_trait]
    impl HealthProbe for HealthyAfter {
        async fn is_healthy(&self, _rpc_url: &str) -> bool {
            self.polls.fetch_add(1, Ordering::SeqCst) + 1 >= self.after
        }
    }

    struct Idle {
        exited: Option<String>,
    }

    #[async_trait]
    impl RunningValidator for Idle {
        fn pid(&self) -> u32 {
            7
        }
        fn try_exited(&mut self) -> Option<String> {
            self.exited.clone()
        }
        async fn shutdown(&mut self, _grace: Duration) -> std::io::Result<()> {
            Ok(())
        }
        async fn wait(&mut self) -> std::io::Result<String> {
            Ok("exit status: 0".into())
        }
    }

    fn probe(after: usize) -> HealthyAfter {
        HealthyAfter {
            polls: AtomicUsize::new(0),
            after,
        }
    }

    async fn wait(
        probe: &dyn HealthProbe,
        process: &mut dyn RunningValidator,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), ValidatorStartError> {
        wait_until_ready(
            probe,
            process,
            "http://127.0.0.1:8899",
            timeout,
            Duration::from_millis(5),
            std::path::Path::new("/tmp/ledger/validator.log"),
            cancel,
        )
        .await
    }

    #[tokio::test]
    async fn test_ready_after_some_polls() {
        let p = probe(3);
        let mut proc = Idle { exited: None };
        wait(&p, &mut proc, Duration::from_secs(5), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(p.polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_times_out() {
        let mut proc = Idle { exited: None };
        let err = wait(&probe(usize::MAX), &mut proc, Duration::from_millis(30), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ValidatorStartError::ReadinessTimeout { .. }));
    }

    #[tokio::test]
    async fn test_exit_before_ready() {
        let mut proc = Idle {
            exited: Some("exit status: 1".into()),
        };
        let err = wait(&probe(1), &mut proc, Duration::from_secs(5), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ValidatorStartError::ExitedBeforeReady { .. }));
    }

    #[tokio::test]
    async fn test_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut proc = Idle { exited: None };
        let err = wait(&probe(usize::MAX), &mut proc, Duration::from_secs(5), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ValidatorStartError::Cancelled));
    }

    #[tokio::test]
    async fn test_rpc_probe_unreachable() {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let probe = RpcHealthProbe::new(Duration::from_millis(500));
        assert!(!probe.is_healthy(&format!("http://127.0.0.1:{}", port)).await);
    }
}
