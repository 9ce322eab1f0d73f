//! Process-level online/offline signal.

use tokio::sync::watch;
use tracing::{info, warn};

/// Shared connectivity flag.
///
/// Written by the resilient wrapper, read by callers that want to
/// short-circuit work while offline. Once exhausted network retries mark it
/// offline, only a confirmed change-feed subscription or the host calling
/// [`Connectivity::set_online`] brings it back. Cloning shares the same flag.
#[derive(Clone)]
pub struct Connectivity {
    tx: watch::Sender<bool>,
}

impl Connectivity {
    #[must_use]
    pub fn new(online: bool) -> Self {
        let (tx, _) = watch::channel(online);
        Self { tx }
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Update the flag. Subscribers only wake on an actual transition.
    pub fn set_online(&self, online: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                return false;
            }
            *current = online;
            true
        });

        if changed {
            if online {
                info!("Connectivity restored");
            } else {
                warn!("Connectivity lost");
            }
        }
    }

    /// Watch transitions of the flag.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_online() {
        assert!(Connectivity::default().is_online());
    }

    #[test]
    fn test_clones_share_state() {
        let connectivity = Connectivity::default();
        let other = connectivity.clone();

        other.set_online(false);

        assert!(!connectivity.is_online());
    }

    #[tokio::test]
    async fn test_subscribers_see_transitions_only() {
        let connectivity = Connectivity::default();
        let mut rx = connectivity.subscribe();

        connectivity.set_online(true);
        assert!(!rx.has_changed().unwrap());

        connectivity.set_online(false);
        rx.changed().await.unwrap();
        assert!(!*rx.borrow_and_update());
    }
}
