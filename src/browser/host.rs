use crate::adapters::{AdapterContext, AdapterRegistry};
use crate::browser::page::ChromePage;
use crate::browser::session::BrowserSession;
use crate::error::{AutofillError, Result};
use crate::inject::{TabHost, TabInfo};
use crate::runtime::{ContentMessage, ContentResponse, ContentRuntime, PingReply};
use async_trait::async_trait;
use headless_chrome::Tab;
use std::sync::Arc;

/// [`TabHost`] backed by a [`BrowserSession`]
///
/// The page half of the content runtime is the JS bridge; the adapter logic runs here
/// against a [`ChromePage`] for the duration of one message.
pub struct ChromeTabHost {
    session: Arc<BrowserSession>,
    registry: AdapterRegistry,
    ctx: AdapterContext,
}

impl ChromeTabHost {
    pub fn new(session: Arc<BrowserSession>, registry: AdapterRegistry, ctx: AdapterContext) -> Self {
        Self { session, registry, ctx }
    }

    pub fn session(&self) -> &Arc<BrowserSession> {
        &self.session
    }

    fn tab(&self, tab: &TabInfo) -> Result<Arc<Tab>> {
        self.session.tab_by_id(&tab.id)
    }
}

#[async_trait]
impl TabHost for ChromeTabHost {
    async fn active_tab(&self) -> Result<TabInfo> {
        let tab = self.session.get_active_tab()?;
        Ok(TabInfo::new(tab.get_target_id().clone(), tab.get_url()))
    }

    async fn inject_runtime(&self, tab: &TabInfo) -> Result<()> {
        let page = ChromePage::new(self.tab(tab)?);
        page.install()
            .map_err(|e| AutofillError::InjectionFailed(format!("{}: {}", tab.url, e)))
    }

    async fn send(&self, tab: &TabInfo, message: ContentMessage) -> Result<ContentResponse> {
        let page = ChromePage::new(self.tab(tab)?);
        match message {
            ContentMessage::Ping => {
                let reply: PingReply = page.call("ping", serde_json::json!([]))?;
                Ok(ContentResponse::Ping(reply))
            }
            message @ ContentMessage::Autofill { .. } => {
                if !page.is_installed()? {
                    return Err(AutofillError::Communication(format!("No content runtime in tab {}", tab.id)));
                }
                let mut runtime = ContentRuntime::new(page, self.registry.clone(), self.ctx.clone());
                runtime.boot();
                Ok(runtime.handle(message).await)
            }
        }
    }
}
