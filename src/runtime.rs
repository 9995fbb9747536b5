//! Content-script runtime
//!
//! The per-page half of the engine. It answers liveness pings and turns an autofill
//! request into an adapter run. Failures never escape [`ContentRuntime::handle`]: every
//! request gets a structured reply.

use crate::adapters::{AdapterContext, AdapterRegistry, AutofillReport};
use crate::dom::PageDom;
use crate::locator::FieldType;
use crate::model::AutofillPayload;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Messages understood by the content runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type")]
pub enum ContentMessage {
    #[serde(rename = "AXIS_PING")]
    Ping,

    #[serde(rename = "AXIS_AUTOFILL")]
    Autofill {
        payload: AutofillPayload,
        /// Adapter key overriding host-based resolution
        #[serde(default, skip_serializing_if = "Option::is_none")]
        site: Option<String>,
    },
}

/// Liveness answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PingReply {
    /// The runtime is present and listening
    pub ready: bool,
    /// Boot has finished and autofill requests will be served
    pub initialized: bool,
}

impl PingReply {
    pub fn is_live(&self) -> bool {
        self.ready && self.initialized
    }
}

/// Result of an autofill request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AutofillReply {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
    #[serde(default)]
    pub filled_fields: Vec<FieldType>,
    #[serde(default)]
    pub uploaded_count: usize,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl AutofillReply {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

impl From<AutofillReport> for AutofillReply {
    fn from(report: AutofillReport) -> Self {
        Self {
            success: true,
            error: None,
            site: Some(report.site),
            filled_fields: report.filled_fields,
            uploaded_count: report.uploaded_count,
            warnings: report.warnings,
        }
    }
}

/// Reply to a [`ContentMessage`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ContentResponse {
    Ping(PingReply),
    Autofill(AutofillReply),
}

/// Runtime living inside one page
pub struct ContentRuntime<D> {
    dom: D,
    registry: AdapterRegistry,
    ctx: AdapterContext,
    initialized: bool,
}

impl<D: PageDom> ContentRuntime<D> {
    pub fn new(dom: D, registry: AdapterRegistry, ctx: AdapterContext) -> Self {
        Self {
            dom,
            registry,
            ctx,
            initialized: false,
        }
    }

    /// Finish initialization; pings report `initialized` from here on
    pub fn boot(&mut self) {
        if !self.initialized {
            log::debug!("Content runtime initialized");
        }
        self.initialized = true;
    }

    pub fn ping(&self) -> PingReply {
        PingReply {
            ready: true,
            initialized: self.initialized,
        }
    }

    pub fn dom(&self) -> &D {
        &self.dom
    }

    pub fn into_dom(self) -> D {
        self.dom
    }

    pub async fn handle(&mut self, message: ContentMessage) -> ContentResponse {
        match message {
            ContentMessage::Ping => ContentResponse::Ping(self.ping()),
            ContentMessage::Autofill { payload, site } => {
                ContentResponse::Autofill(self.autofill(&payload, site.as_deref()).await)
            }
        }
    }

    /// Entry point for raw JSON messages, e.g. from a page bridge
    pub async fn handle_json(&mut self, raw: serde_json::Value) -> serde_json::Value {
        let response = match serde_json::from_value::<ContentMessage>(raw) {
            Ok(message) => self.handle(message).await,
            Err(e) => {
                log::warn!("Malformed content message: {}", e);
                ContentResponse::Autofill(AutofillReply::failure(format!("Malformed message: {}", e)))
            }
        };
        serde_json::to_value(&response).unwrap_or_else(|e| serde_json::json!({ "success": false, "error": e.to_string() }))
    }

    async fn autofill(&mut self, payload: &AutofillPayload, site: Option<&str>) -> AutofillReply {
        if !self.initialized {
            return AutofillReply::failure("Content script is still initializing");
        }

        let location = match self.dom.location() {
            Ok(location) => location,
            Err(e) => return AutofillReply::failure(e.to_string()),
        };

        let adapter = match self.registry.select(site, &location) {
            Ok(adapter) => adapter,
            Err(e) => {
                log::warn!("{}", e);
                return AutofillReply::failure(e.to_string());
            }
        };

        match adapter.apply(&mut self.dom, payload, &self.ctx).await {
            Ok(report) => report.into(),
            Err(e) => {
                log::error!("Autofill on {} failed: {}", location, e);
                let mut reply = AutofillReply::failure(e.to_string());
                reply.site = Some(adapter.key().to_string());
                reply
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UploadConfig;
    use crate::dom::{DomTree, ElementNode};
    use crate::error::{AutofillError, Result};
    use crate::images::ImageFile;
    use crate::model::PropertyRecord;
    use crate::upload::{ImageFetcher, UploadExecutor};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    struct NoImages;

    #[async_trait]
    impl ImageFetcher for NoImages {
        async fn fetch(&self, url: &str) -> Result<ImageFile> {
            Err(AutofillError::FetchFailed {
                url: url.to_string(),
                reason: "offline".into(),
            })
        }
    }

    fn runtime(url: &str) -> ContentRuntime<DomTree> {
        let root = ElementNode::new("body").with_child(ElementNode::input("text").with_attr("name", "title"));
        let ctx = AdapterContext::new(
            UploadExecutor::new(Arc::new(NoImages), UploadConfig::default()),
            Duration::ZERO,
        );
        ContentRuntime::new(DomTree::new(url, root), AdapterRegistry::default(), ctx)
    }

    fn payload() -> AutofillPayload {
        AutofillPayload::new(PropertyRecord::new("7", "Townhouse"), None)
    }

    #[tokio::test]
    async fn test_ping_reports_boot_state() {
        let mut rt = runtime("https://www.bayut.com/post");
        assert_eq!(
            rt.handle(ContentMessage::Ping).await,
            ContentResponse::Ping(PingReply {
                ready: true,
                initialized: false
            })
        );
        rt.boot();
        assert!(rt.ping().is_live());
    }

    #[tokio::test]
    async fn test_autofill_before_boot_is_refused() {
        let mut rt = runtime("https://www.bayut.com/post");
        let response = rt
            .handle(ContentMessage::Autofill {
                payload: payload(),
                site: None,
            })
            .await;
        let ContentResponse::Autofill(reply) = response else {
            panic!("expected autofill reply");
        };
        assert!(!reply.success);
        assert!(reply.error.unwrap().contains("initializing"));
    }

    #[tokio::test]
    async fn test_unsupported_site_is_a_structured_failure() {
        let mut rt = runtime("https://www.example.com/listing");
        rt.boot();
        let ContentResponse::Autofill(reply) = rt
            .handle(ContentMessage::Autofill {
                payload: payload(),
                site: None,
            })
            .await
        else {
            panic!("expected autofill reply");
        };
        assert!(!reply.success);
        assert_eq!(reply.error.as_deref(), Some("Unsupported site: https://www.example.com/listing"));
    }

    #[tokio::test]
    async fn test_site_key_overrides_location() {
        let mut rt = runtime("https://staging.example.com/listing");
        rt.boot();
        let ContentResponse::Autofill(reply) = rt
            .handle(ContentMessage::Autofill {
                payload: payload(),
                site: Some("justproperty".into()),
            })
            .await
        else {
            panic!("expected autofill reply");
        };
        assert!(reply.success);
        assert_eq!(reply.site.as_deref(), Some("justproperty"));
        assert_eq!(reply.filled_fields, vec![FieldType::Title]);

        let dom = rt.into_dom();
        let title = dom.query(crate::dom::Scope::Document, "input").unwrap().unwrap();
        assert_eq!(dom.value(title), "Townhouse");
    }

    #[tokio::test]
    async fn test_handle_json_wire_format() {
        let mut rt = runtime("https://www.bayut.com/post");
        rt.boot();

        let pong = rt.handle_json(json!({ "type": "AXIS_PING" })).await;
        assert_eq!(pong, json!({ "ready": true, "initialized": true }));

        let bad = rt.handle_json(json!({ "type": "AXIS_SHUTDOWN" })).await;
        assert_eq!(bad["success"], json!(false));
        assert!(bad["error"].as_str().unwrap().starts_with("Malformed message"));

        let filled = rt
            .handle_json(json!({
                "type": "AXIS_AUTOFILL",
                "payload": { "property": { "id": 7, "title": "Villa" } }
            }))
            .await;
        assert_eq!(filled["success"], json!(true));
        assert_eq!(filled["filledFields"], json!(["title"]));
    }
}
