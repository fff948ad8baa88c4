use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Kill switch shared between a watcher and the runner.
///
/// Clones share one flag. The watcher calls [`signal`](Self::signal); the
/// runner only reads [`is_signaled`](Self::is_signaled). The flag is never
/// reset: a fresh token is created for every run.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn signal(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Non-blocking read of the flag.
    pub fn is_signaled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn starts_unsignaled_and_signal_is_idempotent() {
        let token = CancellationToken::new();
        assert!(!token.is_signaled());
        token.signal();
        token.signal();
        assert!(token.is_signaled());
    }

    #[test]
    fn clones_observe_signal_from_another_thread() {
        let token = CancellationToken::new();
        let watcher = token.clone();
        thread::spawn(move || watcher.signal()).join().unwrap();
        assert!(token.is_signaled());
    }
}
