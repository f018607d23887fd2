//! Ownership of a single browser process for the duration of one audit.

use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use super::{BrowserLauncher, BrowserProcess};
use crate::error::AcquisitionError;

/// A launched browser process, terminated exactly once.
///
/// Call [`BrowserSession::release`] when the audit is done. A session that is
/// dropped without being released (early return, cancellation) terminates
/// its process on a background task instead.
pub struct BrowserSession {
    process: Option<Box<dyn BrowserProcess>>,
    launched_at: Instant,
}

impl BrowserSession {
    /// Launch a process, failing if it does not come up within `timeout`.
    pub async fn launch(
        launcher: &dyn BrowserLauncher,
        timeout: Duration,
    ) -> Result<Self, AcquisitionError> {
        let started = Instant::now();
        let process = tokio::time::timeout(timeout, launcher.launch())
            .await
            .map_err(|_| AcquisitionError::Timeout {
                stage: "browser launch",
                after: timeout,
            })??;

        debug!(
            launch_ms = started.elapsed().as_millis() as u64,
            "browser session started"
        );

        Ok(Self {
            process: Some(process),
            launched_at: Instant::now(),
        })
    }

    /// The running process.
    pub fn process(&self) -> Result<&dyn BrowserProcess, AcquisitionError> {
        self.process
            .as_deref()
            .ok_or_else(|| AcquisitionError::Browser("browser session already released".into()))
    }

    /// Terminate the process. Termination errors are logged, not returned:
    /// by the time a session is released the audit outcome is already known.
    pub async fn release(mut self) {
        if let Some(process) = self.process.take() {
            let held_ms = self.launched_at.elapsed().as_millis() as u64;
            match process.terminate().await {
                Ok(()) => info!(held_ms, "browser session released"),
                Err(e) => warn!(held_ms, "browser termination failed: {e:#}"),
            }
        }
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        let Some(process) = self.process.take() else {
            return;
        };

        warn!("browser session dropped without release; terminating in background");
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = process.terminate().await {
                        warn!("background browser termination failed: {e:#}");
                    }
                });
            }
            Err(_) => {
                error!("no async runtime to terminate browser; relying on process drop");
                drop(process);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::PageContext;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Counters {
        launched: AtomicUsize,
        terminated: AtomicUsize,
    }

    struct CountingProcess(Arc<Counters>);

    #[async_trait]
    impl BrowserProcess for CountingProcess {
        async fn new_page(&self) -> anyhow::Result<Box<dyn PageContext>> {
            anyhow::bail!("no pages in this test")
        }

        async fn terminate(self: Box<Self>) -> anyhow::Result<()> {
            self.0.terminated.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct CountingLauncher {
        counters: Arc<Counters>,
        delay: Duration,
    }

    #[async_trait]
    impl BrowserLauncher for CountingLauncher {
        async fn launch(&self) -> Result<Box<dyn BrowserProcess>, AcquisitionError> {
            tokio::time::sleep(self.delay).await;
            self.counters.launched.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(CountingProcess(self.counters.clone())))
        }
    }

    fn launcher(delay: Duration) -> (CountingLauncher, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        (
            CountingLauncher {
                counters: counters.clone(),
                delay,
            },
            counters,
        )
    }

    #[tokio::test]
    async fn test_release_terminates_once() {
        let (launcher, counters) = launcher(Duration::ZERO);
        let session = BrowserSession::launch(&launcher, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(session.process().is_ok());
        session.release().await;

        assert_eq!(counters.launched.load(Ordering::SeqCst), 1);
        assert_eq!(counters.terminated.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_drop_terminates_in_background() {
        let (launcher, counters) = launcher(Duration::ZERO);
        let session = BrowserSession::launch(&launcher, Duration::from_secs(1))
            .await
            .unwrap();
        drop(session);

        for _ in 0..50 {
            if counters.terminated.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(counters.terminated.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_launch_timeout() {
        let (launcher, counters) = launcher(Duration::from_secs(5));
        let err = BrowserSession::launch(&launcher, Duration::from_millis(20))
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            AcquisitionError::Timeout {
                stage: "browser launch",
                ..
            }
        ));
        assert_eq!(counters.terminated.load(Ordering::SeqCst), 0);
    }
}
