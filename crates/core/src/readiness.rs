//! One-shot readiness signals between pipeline stages.

use std::time::Duration;

use tokio::sync::watch;
use tracing::debug;

use crate::{OvexError, Result};

/// A latch one stage sets to unblock the next.
///
/// Waiting is always bounded: a stage whose predecessor never signals fails
/// with [`OvexError::ReadinessTimeout`] instead of stalling the pipeline.
#[derive(Debug)]
pub struct Readiness {
    stage: &'static str,
    tx: watch::Sender<bool>,
}

impl Readiness {
    pub fn new(stage: &'static str) -> Self {
        let (tx, _) = watch::channel(false);
        Self { stage, tx }
    }

    pub fn signal(&self) {
        if !self.tx.send_replace(true) {
            debug!(stage = self.stage, "ready");
        }
    }

    pub fn is_ready(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn reset(&self) {
        self.tx.send_replace(false);
    }

    /// Resolves once signalled, or fails after `timeout`.
    pub async fn wait(&self, timeout: Duration) -> Result<()> {
        let mut rx = self.tx.subscribe();
        match tokio::time::timeout(timeout, rx.wait_for(|ready| *ready)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) | Err(_) => Err(OvexError::ReadinessTimeout {
                stage: self.stage.to_string(),
                waited_ms: timeout.as_millis() as u64,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_wait_returns_immediately_when_ready() {
        let ready = Readiness::new("sources");
        ready.signal();
        ready.wait(Duration::from_millis(10)).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_unblocks_on_signal() {
        let ready = Arc::new(Readiness::new("sources"));
        let signaller = ready.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            signaller.signal();
        });

        ready.wait(Duration::from_secs(5)).await.unwrap();
        assert!(ready.is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out() {
        let ready = Readiness::new("webhook");
        let err = ready.wait(Duration::from_secs(2)).await.unwrap_err();
        assert!(matches!(err, OvexError::ReadinessTimeout { waited_ms: 2000, .. }));
    }

    #[test]
    fn test_reset_clears_signal() {
        let ready = Readiness::new("webhook");
        ready.signal();
        ready.reset();
        assert!(!ready.is_ready());
    }
}
