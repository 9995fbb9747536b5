//! Runtime injection and readiness handshake
//!
//! Before an autofill command is sent, the background makes sure the active tab runs a
//! live, fully initialized content runtime:
//!
//! ```text
//! not-injected -> injecting -> awaiting-ready -> ready | timed-out
//! ```
//!
//! A runtime that is already resident (single-page navigations) short-circuits to
//! `ready`. Polling after injection is bounded by [`ReadinessConfig::ping_retries`] with a
//! linear, capped backoff from [`backoff_delay`]; each ping is itself bounded by
//! [`ReadinessConfig::ping_timeout_ms`].

use crate::config::ReadinessConfig;
use crate::error::{AutofillError, Result};
use crate::runtime::{ContentMessage, ContentResponse};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// A browser tab as seen by the background
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabInfo {
    pub id: String,
    pub url: String,
}

impl TabInfo {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
        }
    }
}

/// Browser-side operations the background needs
#[async_trait]
pub trait TabHost: Send + Sync {
    /// The tab the user is looking at
    async fn active_tab(&self) -> Result<TabInfo>;

    /// Install the content runtime into `tab`
    async fn inject_runtime(&self, tab: &TabInfo) -> Result<()>;

    /// Deliver `message` to the runtime in `tab` and wait for its reply
    async fn send(&self, tab: &TabInfo, message: ContentMessage) -> Result<ContentResponse>;
}

/// Handshake progress for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionState {
    NotInjected,
    Injecting,
    AwaitingReady,
    Ready,
    TimedOut,
}

/// How readiness was established
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    /// A runtime was already running; nothing was injected
    pub resident: bool,
    /// Pings sent after injection
    pub attempts: u32,
}

/// Delay before retry number `attempt` (zero-based): `base + step * attempt`, capped
pub fn backoff_delay(config: &ReadinessConfig, attempt: u32) -> Duration {
    let ms = config
        .backoff_base_ms
        .saturating_add(config.backoff_step_ms.saturating_mul(u64::from(attempt)));
    Duration::from_millis(ms.min(config.backoff_cap_ms))
}

/// Whether a runtime can be injected into a page at `url`
pub fn is_injectable(url: &str) -> bool {
    url::Url::parse(url).is_ok_and(|u| matches!(u.scheme(), "http" | "https"))
}

/// Drives the handshake against a [`TabHost`]
#[derive(Clone)]
pub struct ReadinessOrchestrator {
    host: Arc<dyn TabHost>,
    config: ReadinessConfig,
}

impl ReadinessOrchestrator {
    pub fn new(host: Arc<dyn TabHost>, config: ReadinessConfig) -> Self {
        Self { host, config }
    }

    pub fn host(&self) -> &Arc<dyn TabHost> {
        &self.host
    }

    fn transition(&self, tab: &TabInfo, state: &mut InjectionState, next: InjectionState) {
        log::debug!("Tab {}: {:?} -> {:?}", tab.id, state, next);
        *state = next;
    }

    /// A single ping; true only for a runtime that is both alive and initialized.
    /// An unanswered ping fails after [`ReadinessConfig::ping_timeout`].
    async fn ping(&self, tab: &TabInfo) -> bool {
        let reply = tokio::time::timeout(self.config.ping_timeout(), self.host.send(tab, ContentMessage::Ping)).await;
        let Ok(reply) = reply else {
            log::debug!("Tab {}: ping unanswered after {:?}", tab.id, self.config.ping_timeout());
            return false;
        };
        match reply {
            Ok(ContentResponse::Ping(reply)) if reply.is_live() => true,
            Ok(ContentResponse::Ping(reply)) => {
                log::debug!("Tab {}: runtime alive but not initialized ({:?})", tab.id, reply);
                false
            }
            Ok(other) => {
                log::warn!("Tab {}: unexpected ping reply {:?}", tab.id, other);
                false
            }
            Err(e) => {
                log::trace!("Tab {}: ping failed: {}", tab.id, e);
                false
            }
        }
    }

    /// Make sure `tab` hosts a ready runtime, injecting it if needed
    pub async fn ensure_ready(&self, tab: &TabInfo) -> Result<Readiness> {
        if !is_injectable(&tab.url) {
            return Err(AutofillError::UnsupportedPage(tab.url.clone()));
        }

        let mut state = InjectionState::NotInjected;
        if self.ping(tab).await {
            self.transition(tab, &mut state, InjectionState::Ready);
            return Ok(Readiness {
                resident: true,
                attempts: 0,
            });
        }

        self.transition(tab, &mut state, InjectionState::Injecting);
        self.host.inject_runtime(tab).await.map_err(|e| match e {
            AutofillError::InjectionFailed(_) => e,
            other => AutofillError::InjectionFailed(other.to_string()),
        })?;
        tokio::time::sleep(Duration::from_millis(self.config.inject_settle_ms)).await;

        self.transition(tab, &mut state, InjectionState::AwaitingReady);
        let retries = self.config.ping_retries;
        for attempt in 0..retries {
            if self.ping(tab).await {
                self.transition(tab, &mut state, InjectionState::Ready);
                log::info!("Content runtime ready in tab {} after {} pings", tab.id, attempt + 1);
                return Ok(Readiness {
                    resident: false,
                    attempts: attempt + 1,
                });
            }
            if attempt + 1 < retries {
                tokio::time::sleep(backoff_delay(&self.config, attempt)).await;
            }
        }

        self.transition(tab, &mut state, InjectionState::TimedOut);
        log::warn!("Content runtime in tab {} not ready after {} pings", tab.id, retries);
        Err(AutofillError::NotReady { attempts: retries })
    }

    /// Ensure readiness, then deliver `message`
    pub async fn deliver(&self, tab: &TabInfo, message: ContentMessage) -> Result<ContentResponse> {
        self.ensure_ready(tab).await?;
        self.host.send(tab, message).await.map_err(|e| match e {
            AutofillError::Communication(_) => e,
            other => AutofillError::Communication(other.to_string()),
        })
    }
}
