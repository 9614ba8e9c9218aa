//! Race windows: short-lived echo suppression after a propagated write.
//!
//! When the engine writes a state to a peer, the peer will report that
//! change back (as a push event or on its next poll). While the peer's
//! window is open, such reports are treated as self-inflicted and are not
//! propagated again, which breaks the feedback loop between paired switches.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

use threeway_domain::id::SerialNumber;

struct RaceWindow {
    generation: u64,
    expires_at: Instant,
    expiry: JoinHandle<()>,
}

#[derive(Default)]
struct Windows {
    active: HashMap<SerialNumber, RaceWindow>,
    next_generation: u64,
}

/// Per-device suppression timers.
///
/// Cloning shares the same set of windows.
#[derive(Clone, Default)]
pub struct RaceWindows {
    inner: Arc<Mutex<Windows>>,
}

impl RaceWindows {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a window for `serial` lasting `timeout`.
    ///
    /// An already open window is cancelled and replaced, so the expiry is
    /// always measured from the latest write. Returns `true` when a window
    /// was replaced.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, serial: &SerialNumber, timeout: Duration) -> bool {
        let mut windows = self.lock();
        let generation = windows.next_generation;
        windows.next_generation += 1;

        let expires_at = Instant::now() + timeout;
        let expiry = tokio::spawn(expire(
            Arc::downgrade(&self.inner),
            serial.clone(),
            generation,
            expires_at,
        ));

        let window = RaceWindow {
            generation,
            expires_at,
            expiry,
        };
        match windows.active.insert(serial.clone(), window) {
            Some(previous) => {
                previous.expiry.abort();
                tracing::trace!(serial = %serial, "existing race timeout cleared");
                true
            }
            None => false,
        }
    }

    /// Whether a window is currently open for `serial`.
    #[must_use]
    pub fn is_active(&self, serial: &SerialNumber) -> bool {
        self.lock()
            .active
            .get(serial)
            .is_some_and(|window| window.expires_at > Instant::now())
    }

    /// Number of windows not yet cleared by their expiry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().active.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Windows> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn expire(
    windows: Weak<Mutex<Windows>>,
    serial: SerialNumber,
    generation: u64,
    expires_at: Instant,
) {
    tokio::time::sleep_until(expires_at).await;
    let Some(windows) = windows.upgrade() else {
        return;
    };
    let mut windows = windows.lock().unwrap_or_else(PoisonError::into_inner);
    // A replacement may have been installed while this task was waking up.
    if windows
        .active
        .get(&serial)
        .is_some_and(|window| window.generation == generation)
    {
        windows.active.remove(&serial);
        tracing::trace!(serial = %serial, "race timeout cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sn(value: &str) -> SerialNumber {
        SerialNumber::new(value).unwrap()
    }

    async fn settle() {
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn should_be_inactive_without_write() {
        let races = RaceWindows::new();
        assert!(!races.is_active(&sn("A")));
        assert!(races.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn should_stay_active_until_timeout() {
        let races = RaceWindows::new();
        assert!(!races.start(&sn("A"), Duration::from_secs(5)));

        tokio::time::advance(Duration::from_millis(4_900)).await;
        assert!(races.is_active(&sn("A")));

        tokio::time::advance(Duration::from_millis(200)).await;
        settle().await;
        assert!(!races.is_active(&sn("A")));
        assert!(races.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn should_measure_expiry_from_latest_write() {
        let races = RaceWindows::new();
        races.start(&sn("A"), Duration::from_secs(5));

        tokio::time::advance(Duration::from_secs(3)).await;
        assert!(races.start(&sn("A"), Duration::from_secs(5)));
        assert_eq!(races.len(), 1);

        // Past the first window's deadline, inside the second's.
        tokio::time::advance(Duration::from_secs(3)).await;
        settle().await;
        assert!(races.is_active(&sn("A")));
        assert_eq!(races.len(), 1);

        tokio::time::advance(Duration::from_millis(2_100)).await;
        settle().await;
        assert!(!races.is_active(&sn("A")));
        assert!(races.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn should_track_devices_independently() {
        let races = RaceWindows::new();
        races.start(&sn("A"), Duration::from_secs(5));
        races.start(&sn("B"), Duration::from_secs(1));

        tokio::time::advance(Duration::from_secs(2)).await;
        settle().await;
        assert!(races.is_active(&sn("A")));
        assert!(!races.is_active(&sn("B")));
        assert_eq!(races.len(), 1);
    }
}
