//! Kill-switch watchers.
//!
//! Each watcher runs as its own Tokio task and only ever calls
//! `CancellationToken::signal`; the runner notices between steps.
//!
//! Ctrl+C only reaches the process while its console has focus. Once the run
//! focuses the target window, the global kill-key hotkey is the switch the
//! operator can actually reach.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::driver::{CancellationToken, KeyCombo};
use crate::utils::window;

/// How often the kill-key hotkey is sampled.
pub const HOTKEY_POLL: Duration = Duration::from_millis(50);

/// Signal `token` when the process receives Ctrl+C.
pub fn spawn_interrupt_watcher(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!(target: "keypilot::watcher", "Received Ctrl+C, cancelling run");
                token.signal();
            }
            Err(e) => {
                error!(
                    target: "keypilot::watcher",
                    error = %e,
                    "Failed to listen for Ctrl+C; kill switch disabled"
                );
            }
        }
    })
}

/// Signal `token` once `after` has elapsed.
pub fn spawn_deadline(token: CancellationToken, after: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        if !token.is_signaled() {
            info!(
                target: "keypilot::watcher",
                deadline_ms = after.as_millis() as u64,
                "Run deadline reached, cancelling run"
            );
        }
        token.signal();
    })
}

/// Signal `token` when `combo` is held down, whichever window has focus.
///
/// Where the platform exposes no global key state the watcher logs a warning
/// and exits immediately; Ctrl+C and the deadline still work.
pub fn spawn_hotkey_watcher(token: CancellationToken, combo: KeyCombo) -> JoinHandle<()> {
    if window::combo_is_down(&combo).is_none() {
        warn!(
            target: "keypilot::watcher",
            key = %combo,
            "Kill-key hotkey is not available on this platform; only Ctrl+C in this console can stop the run"
        );
        return tokio::spawn(async {});
    }
    info!(target: "keypilot::watcher", key = %combo, "Kill-key hotkey armed");
    spawn_hotkey_watcher_with(token, HOTKEY_POLL, move || {
        window::combo_is_down(&combo).unwrap_or(false)
    })
}

/// Sample `is_down` every `poll` and signal `token` the first time it reports
/// true. The task ends once the token is signaled by anyone.
pub fn spawn_hotkey_watcher_with<F>(
    token: CancellationToken,
    poll: Duration,
    mut is_down: F,
) -> JoinHandle<()>
where
    F: FnMut() -> bool + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(poll.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if token.is_signaled() {
                debug!(target: "keypilot::watcher", "Token already signaled; hotkey watcher exiting");
                return;
            }
            if is_down() {
                info!(target: "keypilot::watcher", "Kill key pressed, cancelling run");
                token.signal();
                return;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deadline_signals_after_elapsing() {
        let token = CancellationToken::new();
        let handle = spawn_deadline(token.clone(), Duration::from_millis(20));
        assert!(!token.is_signaled());
        handle.await.unwrap();
        assert!(token.is_signaled());
    }

    #[tokio::test]
    async fn interrupt_watcher_leaves_token_alone_until_ctrl_c() {
        let token = CancellationToken::new();
        let handle = spawn_interrupt_watcher(token.clone());
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.abort();
        assert!(!token.is_signaled());
    }

    #[tokio::test]
    async fn hotkey_press_signals_the_token() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let token = CancellationToken::new();
        let samples = Arc::new(AtomicUsize::new(0));
        let seen = samples.clone();
        let handle = spawn_hotkey_watcher_with(token.clone(), Duration::from_millis(5), move || {
            seen.fetch_add(1, Ordering::SeqCst) + 1 == 3
        });

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("watcher should stop after the key press")
            .unwrap();
        assert!(token.is_signaled());
        assert_eq!(samples.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn hotkey_watcher_exits_once_cancelled_elsewhere() {
        let token = CancellationToken::new();
        let handle = spawn_hotkey_watcher_with(token.clone(), Duration::from_millis(5), || false);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!token.is_signaled());

        token.signal();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("watcher should notice the signal")
            .unwrap();
    }

    #[cfg(not(windows))]
    #[tokio::test]
    async fn hotkey_watcher_is_inert_without_global_key_state() {
        let token = CancellationToken::new();
        let combo = KeyCombo::parse("ESC").unwrap();
        spawn_hotkey_watcher(token.clone(), combo).await.unwrap();
        assert!(!token.is_signaled());
    }
}
