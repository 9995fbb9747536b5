//! Background process
//!
//! Owns the [`ExtensionContext`] and answers [`RuntimeMessage`]s. Every handler failure
//! is converted into a [`RuntimeResponse`] here; nothing propagates past [`Background::handle`].

use crate::adapters::AdapterRegistry;
use crate::config::EngineConfig;
use crate::error::{AutofillError, Result};
use crate::inject::{ReadinessOrchestrator, TabHost, TabInfo};
use crate::messaging::{ErrorCode, ErrorInfo, RuntimeMessage, RuntimeResponse};
use crate::model::{AutofillPayload, SettingsPatch};
use crate::runtime::{ContentMessage, ContentResponse};
use crate::state::ExtensionContext;
use crate::sync::{SyncOrchestrator, SyncSummary};
use std::sync::Arc;

pub struct Background {
    ctx: Arc<ExtensionContext>,
    sync: SyncOrchestrator,
    readiness: ReadinessOrchestrator,
    registry: AdapterRegistry,
}

impl Background {
    pub fn new(ctx: Arc<ExtensionContext>, host: Arc<dyn TabHost>, config: &EngineConfig) -> Self {
        Self {
            sync: SyncOrchestrator::new(ctx.clone()),
            readiness: ReadinessOrchestrator::new(host, config.readiness.clone()),
            registry: AdapterRegistry::default(),
            ctx,
        }
    }

    pub fn context(&self) -> &Arc<ExtensionContext> {
        &self.ctx
    }

    /// Sync on startup when enabled and a CRM URL is configured
    pub async fn startup(&self) -> Option<Result<SyncSummary>> {
        let settings = match self.ctx.snapshot().await {
            Ok(state) => state.settings,
            Err(e) => return Some(Err(e)),
        };
        if !settings.auto_sync || settings.base_url.is_empty() {
            log::debug!("Skipping startup sync");
            return None;
        }
        let result = self.sync.sync().await;
        if let Err(e) = &result {
            log::warn!("Startup sync failed: {}", e);
        }
        Some(result)
    }

    pub async fn handle(&self, message: RuntimeMessage) -> RuntimeResponse {
        let name = message.name();
        log::debug!("Handling {}", name);
        match self.dispatch(message).await {
            Ok(response) => response,
            Err(e) => {
                log::warn!("{} failed: {}", name, e);
                RuntimeResponse::from_error(&e)
            }
        }
    }

    async fn dispatch(&self, message: RuntimeMessage) -> Result<RuntimeResponse> {
        match message {
            RuntimeMessage::GetState => Ok(RuntimeResponse::with_state(self.ctx.snapshot().await?)),
            RuntimeMessage::SyncData => {
                let summary = self.sync.sync().await?;
                Ok(RuntimeResponse::ok(format!("Synced {} properties", summary.properties)))
            }
            RuntimeMessage::SetSelectedProperty { property_id } => self.select_property(property_id).await,
            RuntimeMessage::AutofillActiveTab { site } => self.autofill_active_tab(site).await,
            RuntimeMessage::UpdateSettings { settings } => self.update_settings(settings).await,
            RuntimeMessage::Logout => {
                self.ctx.reset().await?;
                Ok(RuntimeResponse::ok("Logged out"))
            }
        }
    }

    async fn select_property(&self, property_id: Option<String>) -> Result<RuntimeResponse> {
        if !self.ctx.update(|s| s.select(property_id)).await? {
            return Ok(RuntimeResponse::failure(ErrorInfo::new(
                ErrorCode::PropertyNotFound,
                "Property not found",
            )));
        }
        Ok(RuntimeResponse::ok("Selection updated"))
    }

    async fn update_settings(&self, patch: SettingsPatch) -> Result<RuntimeResponse> {
        let settings = self
            .ctx
            .update(|s| {
                s.settings.apply(patch);
                s.settings.clone()
            })
            .await?;
        log::info!("Settings updated (base URL '{}')", settings.base_url);
        Ok(RuntimeResponse::ok("Settings saved"))
    }

    /// Adapter key for `tab`: explicit key, then host match, then the configured default
    fn site_for(&self, tab: &TabInfo, site: Option<String>, default_site: Option<String>) -> Result<&'static str> {
        if let Some(key) = site {
            return self
                .registry
                .by_key(&key)
                .map(|a| a.key())
                .ok_or(AutofillError::UnsupportedSite(key));
        }
        if let Some(adapter) = self.registry.resolve(&tab.url) {
            return Ok(adapter.key());
        }
        default_site
            .and_then(|key| self.registry.by_key(&key))
            .map(|a| a.key())
            .ok_or_else(|| AutofillError::UnsupportedSite(tab.url.clone()))
    }

    async fn autofill_active_tab(&self, site: Option<String>) -> Result<RuntimeResponse> {
        let state = self.ctx.snapshot().await?;
        let Some(property) = state.selected_property().cloned() else {
            return Ok(RuntimeResponse::failure(ErrorInfo::new(
                ErrorCode::NoPropertySelected,
                "Select a property before autofilling",
            )));
        };

        let tab = self.readiness.host().active_tab().await?;
        let site = self.site_for(&tab, site, state.settings.default_site.clone())?;
        log::info!("Autofilling property {} into tab {} as {}", property.id, tab.id, site);

        let message = ContentMessage::Autofill {
            payload: AutofillPayload::new(property, state.theme.clone()),
            site: Some(site.to_string()),
        };
        let reply = match self.readiness.deliver(&tab, message).await? {
            ContentResponse::Autofill(reply) => reply,
            ContentResponse::Ping(_) => {
                return Err(AutofillError::Communication(
                    "Content script answered an autofill request with a ping reply".into(),
                ));
            }
        };

        if reply.success {
            let mut response = RuntimeResponse::ok(format!(
                "Filled {} fields and uploaded {} images",
                reply.filled_fields.len(),
                reply.uploaded_count
            ));
            response.autofill = Some(reply);
            Ok(response)
        } else {
            let message = reply.error.clone().unwrap_or_else(|| "Autofill failed".into());
            let mut response = RuntimeResponse::failure(ErrorInfo::new(ErrorCode::Internal, message));
            response.autofill = Some(reply);
            Ok(response)
        }
    }
}
