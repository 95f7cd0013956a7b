//! Link guard for automatic disconnect on drop.
//!
//! The provisioning wizard holds at most one open link. [`LinkGuard`]
//! closes it when released explicitly, and otherwise when the guard is
//! dropped, so an abandoned wizard never leaves the device connected.

use std::ops::Deref;
use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::error::Result;
use crate::traits::Link;

/// A guard that disconnects the link when dropped.
///
/// # Example
///
/// ```
/// use smarttank_core::{Link, LinkGuard, MockLink};
///
/// # #[tokio::main]
/// # async fn main() -> smarttank_core::Result<()> {
/// let link = MockLink::new("AA:BB:CC:DD:EE:FF");
/// let guard = LinkGuard::new(link.clone());
/// assert_eq!(guard.identifier(), "AA:BB:CC:DD:EE:FF");
///
/// guard.release().await?;
/// assert!(!link.is_connected().await);
/// # Ok(())
/// # }
/// ```
pub struct LinkGuard<L: Link> {
    link: Arc<L>,
    released: bool,
}

impl<L: Link> LinkGuard<L> {
    /// Guard an open link.
    pub fn new(link: L) -> Self {
        Self {
            link: Arc::new(link),
            released: false,
        }
    }

    /// The guarded link.
    pub fn link(&self) -> &L {
        &self.link
    }

    /// Disconnect now and wait for the result.
    pub async fn release(mut self) -> Result<()> {
        self.released = true;
        debug!("Releasing link to {}", self.link.identifier());
        self.link.disconnect().await
    }

    /// Consume the guard without disconnecting.
    ///
    /// After calling this, you are responsible for disconnecting the link.
    pub fn into_inner(mut self) -> Arc<L> {
        self.released = true;
        Arc::clone(&self.link)
    }
}

impl<L: Link> Deref for LinkGuard<L> {
    type Target = L;

    fn deref(&self) -> &Self::Target {
        &self.link
    }
}

impl<L: Link> std::fmt::Debug for LinkGuard<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkGuard")
            .field("identifier", &self.link.identifier())
            .field("released", &self.released)
            .finish()
    }
}

impl<L: Link> Drop for LinkGuard<L> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let link = Arc::clone(&self.link);
        if let Ok(handle) = Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = link.disconnect().await {
                    warn!("Failed to disconnect {} in guard drop: {}", link.identifier(), e);
                }
            });
        } else {
            warn!("No tokio runtime available for link disconnect in guard drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockLink;

    #[tokio::test]
    async fn test_release_disconnects() {
        let link = MockLink::new("dev-1");
        let guard = LinkGuard::new(link.clone());
        assert!(link.is_connected().await);

        guard.release().await.unwrap();
        assert!(!link.is_connected().await);
        assert_eq!(link.disconnect_count(), 1);
    }

    #[tokio::test]
    async fn test_drop_disconnects() {
        let link = MockLink::new("dev-1");
        {
            let _guard = LinkGuard::new(link.clone());
        }
        // Let the spawned disconnect run.
        tokio::task::yield_now().await;
        assert!(!link.is_connected().await);
    }

    #[tokio::test]
    async fn test_into_inner_keeps_connection() {
        let link = MockLink::new("dev-1");
        let guard = LinkGuard::new(link.clone());
        let inner = guard.into_inner();
        tokio::task::yield_now().await;
        assert!(inner.is_connected().await);
        assert_eq!(link.disconnect_count(), 0);
    }
}
