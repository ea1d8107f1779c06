//! Read cancellation
//!
//! A [`CancelHandle`] flips a watch channel; every [`CancelSignal`] cloned
//! from the pair observes it. A signal may also carry a deadline, after which
//! it reports cancelled on its own.

use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Create a connected handle/signal pair
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (
        CancelHandle { tx },
        CancelSignal {
            rx: Some(rx),
            deadline: None,
        },
    )
}

/// Owner side; cancelling is idempotent
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Observer side passed into every read
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    rx: Option<watch::Receiver<bool>>,
    deadline: Option<Instant>,
}

impl CancelSignal {
    /// A signal that never fires
    pub fn never() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// Add a deadline `timeout` from now; an earlier deadline wins
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        let signalled = self.rx.as_ref().is_some_and(|rx| *rx.borrow());
        let expired = self.deadline.is_some_and(|deadline| Instant::now() >= deadline);
        signalled || expired
    }

    /// Resolves once cancelled; pending forever if that can no longer happen
    pub async fn cancelled(&self) {
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        let signal = async {
            let Some(mut rx) = self.rx.clone() else {
                return std::future::pending::<()>().await;
            };
            loop {
                if *rx.borrow_and_update() {
                    return;
                }
                // Handle dropped without cancelling
                if rx.changed().await.is_err() {
                    return std::future::pending::<()>().await;
                }
            }
        };

        tokio::select! {
            _ = deadline => {}
            _ = signal => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_is_not_cancelled() {
        assert!(!CancelSignal::never().is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_wakes_waiters() {
        let (handle, signal) = cancel_pair();
        let waiter = signal.clone();
        let task = tokio::spawn(async move { waiter.cancelled().await });

        assert!(!signal.is_cancelled());
        handle.cancel();
        handle.cancel();

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("waiter should wake")
            .unwrap();
        assert!(signal.is_cancelled());
        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn test_deadline_fires() {
        let signal = CancelSignal::never().with_timeout(Duration::from_millis(10));
        tokio::time::timeout(Duration::from_secs(1), signal.cancelled())
            .await
            .expect("deadline should fire");
        assert!(signal.is_cancelled());
    }

    #[test]
    fn test_earlier_deadline_wins() {
        let now = Instant::now();
        let signal = CancelSignal::never()
            .with_deadline(now + Duration::from_secs(5))
            .with_deadline(now + Duration::from_secs(60));
        assert_eq!(signal.deadline(), Some(now + Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn test_dropped_handle_never_fires() {
        let (handle, signal) = cancel_pair();
        drop(handle);

        let result = tokio::time::timeout(Duration::from_millis(20), signal.cancelled()).await;
        assert!(result.is_err());
        assert!(!signal.is_cancelled());
    }
}
