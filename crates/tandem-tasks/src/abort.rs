//! Cooperative abort signal shared by the CLI and the scheduler

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Global abort flag for a run. Raising it more than once has no further effect.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    token: CancellationToken,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal
    pub fn abort(&self) {
        self.token.cancel();
    }

    /// Whether the signal was raised
    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes once the signal is raised
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// A token cancelled together with this signal, usable as a task kill token
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abort_is_idempotent() {
        let signal = AbortSignal::new();
        assert!(!signal.is_aborted());
        signal.abort();
        signal.abort();
        assert!(signal.is_aborted());
    }

    #[tokio::test]
    async fn test_child_tokens_follow_signal() {
        let signal = AbortSignal::new();
        let child = signal.child_token();
        let clone = signal.clone();

        clone.abort();
        child.cancelled().await;
        signal.cancelled().await;
        assert!(child.is_cancelled());
    }
}
