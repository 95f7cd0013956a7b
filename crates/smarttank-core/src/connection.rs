//! Connecting to a device with retries.
//!
//! An attempt is a connect followed by service discovery, both within one
//! deadline of the policy's `attempt_timeout`. A link whose discovery fails is closed
//! before the next attempt, so at most one connection is ever open.

use std::sync::Arc;

use tokio::time::{Instant, sleep, timeout_at};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::events::{EventDispatcher, SetupEvent};
use crate::guard::LinkGuard;
use crate::retry::RetryPolicy;
use crate::traits::{Link, Radio};

/// Opens links according to a [`RetryPolicy`].
pub struct ConnectionManager<R: Radio> {
    radio: Arc<R>,
    policy: RetryPolicy,
    events: Option<EventDispatcher>,
}

impl<R: Radio> ConnectionManager<R> {
    /// Create a connection manager.
    pub fn new(radio: Arc<R>, policy: RetryPolicy) -> Self {
        Self {
            radio,
            policy,
            events: None,
        }
    }

    /// Publish attempt results on `events`.
    #[must_use]
    pub fn with_events(mut self, events: EventDispatcher) -> Self {
        self.events = Some(events);
        self
    }

    /// The retry policy in use.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Connect to `identifier`, retrying per the policy.
    ///
    /// # Errors
    ///
    /// [`Error::ConnectionFailed`] once every attempt failed, carrying the
    /// last attempt's error as the reason. [`Error::InvalidConfig`] if the
    /// policy cannot make progress.
    #[tracing::instrument(level = "info", skip(self), fields(max_attempts = self.policy.max_attempts))]
    pub async fn connect(&self, identifier: &str) -> Result<LinkGuard<R::Link>> {
        self.policy.validate()?;

        let max_attempts = self.policy.max_attempts;
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            info!("Connecting to {} (attempt {}/{})", identifier, attempt, max_attempts);
            match self.attempt(identifier).await {
                Ok(link) => {
                    info!("Connected to {} on attempt {}", identifier, attempt);
                    self.emit(SetupEvent::Connected {
                        identifier: identifier.to_string(),
                        attempts: attempt,
                    });
                    return Ok(LinkGuard::new(link));
                }
                Err(e) => {
                    last_error = e.to_string();
                    self.emit(SetupEvent::ConnectAttemptFailed {
                        identifier: identifier.to_string(),
                        attempt,
                        reason: last_error.clone(),
                    });

                    if attempt < max_attempts {
                        let delay = self.policy.delay_after(attempt);
                        warn!(
                            "Connection to {} failed (attempt {}/{}): {}; retrying in {:?}",
                            identifier, attempt, max_attempts, e, delay
                        );
                        sleep(delay).await;
                    } else {
                        warn!(
                            "Connection to {} failed (attempt {}/{}): {}",
                            identifier, attempt, max_attempts, e
                        );
                    }
                }
            }
        }

        Err(Error::ConnectionFailed {
            identifier: identifier.to_string(),
            attempts: max_attempts,
            reason: last_error,
        })
    }

    async fn attempt(&self, identifier: &str) -> Result<R::Link> {
        let limit = self.policy.attempt_timeout;
        let deadline = Instant::now() + limit;

        let link = timeout_at(deadline, self.radio.connect(identifier))
            .await
            .map_err(|_| Error::timeout("connect to device", limit))??;

        let discovered = match timeout_at(deadline, link.discover_services()).await {
            Ok(result) => result,
            Err(_) => Err(Error::timeout("discover services", limit)),
        };

        if let Err(e) = discovered {
            if let Err(close_err) = link.disconnect().await {
                warn!("Failed to close half-open link: {}", close_err);
            }
            return Err(e);
        }
        Ok(link)
    }

    fn emit(&self, event: SetupEvent) {
        if let Some(events) = &self.events {
            events.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::mock::MockRadio;

    #[tokio::test(start_paused = true)]
    async fn test_persistent_failure_makes_three_attempts() {
        let radio = Arc::new(MockRadio::new());
        radio.set_connect_failures(u32::MAX);

        let manager = ConnectionManager::new(Arc::clone(&radio), RetryPolicy::default());
        let started = Instant::now();
        let err = manager.connect("dev-1").await.unwrap_err();

        match err {
            Error::ConnectionFailed {
                identifier,
                attempts,
                ..
            } => {
                assert_eq!(identifier, "dev-1");
                assert_eq!(attempts, 3);
            }
            other => panic!("expected ConnectionFailed, got {:?}", other),
        }
        assert_eq!(radio.connect_attempts(), 3);
        // Two pauses, none after the last attempt.
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_second_attempt() {
        let radio = Arc::new(MockRadio::new());
        radio.set_connect_failures(1);
        let events = EventDispatcher::default();
        let mut rx = events.subscribe();

        let manager =
            ConnectionManager::new(Arc::clone(&radio), RetryPolicy::default()).with_events(events);
        let guard = manager.connect("dev-1").await.unwrap();

        assert_eq!(guard.identifier(), "dev-1");
        assert!(guard.is_connected().await);
        assert_eq!(radio.connect_attempts(), 2);
        assert!(matches!(
            rx.recv().await.unwrap(),
            SetupEvent::ConnectAttemptFailed { attempt: 1, .. }
        ));
        assert_eq!(
            rx.recv().await.unwrap(),
            SetupEvent::Connected {
                identifier: "dev-1".to_string(),
                attempts: 2
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_timeout() {
        let radio = Arc::new(MockRadio::new());
        radio.set_connect_latency(Duration::from_secs(60));

        let policy = RetryPolicy::once().attempt_timeout(Duration::from_secs(10));
        let manager = ConnectionManager::new(Arc::clone(&radio), policy);
        let err = manager.connect("dev-1").await.unwrap_err();

        match err {
            Error::ConnectionFailed {
                attempts, reason, ..
            } => {
                assert_eq!(attempts, 1);
                assert!(reason.contains("timed out"));
            }
            other => panic!("expected ConnectionFailed, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_and_discovery_share_the_deadline() {
        let radio = Arc::new(MockRadio::new());
        radio.set_connect_latency(Duration::from_secs(6));
        radio.set_discovery_latency(Duration::from_secs(6));

        let policy = RetryPolicy::once().attempt_timeout(Duration::from_secs(10));
        let manager = ConnectionManager::new(Arc::clone(&radio), policy);
        let started = Instant::now();
        let err = manager.connect("dev-1").await.unwrap_err();

        assert_eq!(started.elapsed(), Duration::from_secs(10));
        match err {
            Error::ConnectionFailed { reason, .. } => {
                assert!(reason.contains("discover services"), "{}", reason);
            }
            other => panic!("expected ConnectionFailed, got {:?}", other),
        }
        // The half-open link is closed.
        let link = radio.last_link().unwrap();
        assert!(!link.is_connected().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_attempt_within_deadline_succeeds() {
        let radio = Arc::new(MockRadio::new());
        radio.set_connect_latency(Duration::from_secs(4));
        radio.set_discovery_latency(Duration::from_secs(5));

        let policy = RetryPolicy::once().attempt_timeout(Duration::from_secs(10));
        let manager = ConnectionManager::new(Arc::clone(&radio), policy);
        let guard = manager.connect("dev-1").await.unwrap();
        assert!(guard.is_connected().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_discovery_failure_closes_link() {
        let radio = Arc::new(MockRadio::new());
        radio.set_discovery_failures(1);

        let manager = ConnectionManager::new(Arc::clone(&radio), RetryPolicy::default());
        let guard = manager.connect("dev-1").await.unwrap();

        let links = radio.links();
        assert_eq!(links.len(), 2);
        assert!(!links[0].is_connected().await);
        assert_eq!(links[0].disconnect_count(), 1);
        assert!(guard.is_connected().await);
    }

    #[tokio::test]
    async fn test_invalid_policy_rejected() {
        let radio = Arc::new(MockRadio::new());
        let manager = ConnectionManager::new(Arc::clone(&radio), RetryPolicy::default().max_attempts(0));
        assert!(matches!(
            manager.connect("dev-1").await,
            Err(Error::InvalidConfig(_))
        ));
        assert_eq!(radio.connect_attempts(), 0);
    }
}
