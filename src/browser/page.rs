use crate::dom::{DomEvent, DragKind, NodeId, PageDom, Scope};
use crate::error::{AutofillError, Result};
use crate::images::ImageFile;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use headless_chrome::Tab;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;

/// Page-side bridge installed by [`ChromePage::install`]
pub const BRIDGE_JS: &str = include_str!("bridge.js");

#[derive(Debug, Deserialize)]
struct BridgeReply {
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// [`PageDom`] over a live Chrome tab
///
/// Every call is one `Runtime.evaluate` against the bridge; node handles are indices
/// into a page-side registry and go stale when the page navigates.
pub struct ChromePage {
    tab: Arc<Tab>,
}

impl ChromePage {
    pub fn new(tab: Arc<Tab>) -> Self {
        Self { tab }
    }

    pub fn tab(&self) -> &Arc<Tab> {
        &self.tab
    }

    /// Evaluate `expression`, which must produce a JSON string
    fn evaluate_json(&self, expression: &str) -> Result<Option<BridgeReply>> {
        let result = self
            .tab
            .evaluate(expression, false)
            .map_err(|e| AutofillError::EvaluationFailed(e.to_string()))?;

        match result.value {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(raw)) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| AutofillError::EvaluationFailed(format!("Malformed bridge reply: {}", e))),
            Some(other) => Err(AutofillError::EvaluationFailed(format!("Unexpected bridge reply: {}", other))),
        }
    }

    /// Install the bridge; a no-op when it is already resident
    pub fn install(&self) -> Result<()> {
        match self.evaluate_json(BRIDGE_JS)? {
            Some(reply) if reply.ok => {
                log::debug!("Bridge {} in tab {}", reply.value, self.tab.get_target_id());
                Ok(())
            }
            Some(reply) => Err(AutofillError::InjectionFailed(reply.error.unwrap_or_default())),
            None => Err(AutofillError::InjectionFailed("Bridge script returned nothing".into())),
        }
    }

    /// Whether the bridge is resident in the current document
    pub fn is_installed(&self) -> Result<bool> {
        let result = self
            .tab
            .evaluate("typeof window.__axisAutofill === 'object'", false)
            .map_err(|e| AutofillError::EvaluationFailed(e.to_string()))?;
        Ok(result.value.and_then(|v| v.as_bool()).unwrap_or(false))
    }

    /// Invoke a bridge method
    pub(crate) fn call<T: DeserializeOwned>(&self, method: &str, args: Value) -> Result<T> {
        let expression = format!(
            "window.__axisAutofill ? window.__axisAutofill.call({}, {}) : null",
            json!(method),
            args
        );
        let reply = self
            .evaluate_json(&expression)?
            .ok_or_else(|| AutofillError::Communication("Bridge is not installed in this page".into()))?;

        if !reply.ok {
            let message = reply.error.unwrap_or_default();
            return Err(match reply.kind.as_deref() {
                Some("selector") => AutofillError::InvalidSelector(message),
                Some("stale") => AutofillError::EvaluationFailed(format!("{} (page changed)", message)),
                _ => AutofillError::EvaluationFailed(format!("{}: {}", method, message)),
            });
        }
        serde_json::from_value(reply.value)
            .map_err(|e| AutofillError::EvaluationFailed(format!("{} returned an unexpected value: {}", method, e)))
    }

    fn scope_arg(scope: Scope) -> Value {
        match scope {
            Scope::Document => Value::Null,
            Scope::Shadow(host) => json!(host.0),
        }
    }

    fn files_arg(files: &[ImageFile]) -> Value {
        Value::Array(
            files
                .iter()
                .map(|f| json!({ "name": f.name, "mime": f.mime, "data": STANDARD.encode(&f.bytes) }))
                .collect(),
        )
    }
}

impl PageDom for ChromePage {
    fn location(&self) -> Result<String> {
        self.call("location", json!([]))
    }

    fn query(&self, scope: Scope, selector: &str) -> Result<Option<NodeId>> {
        let found: Option<usize> = self.call("query", json!([Self::scope_arg(scope), selector]))?;
        Ok(found.map(NodeId))
    }

    fn query_all(&self, scope: Scope, selector: &str) -> Result<Vec<NodeId>> {
        let found: Vec<usize> = self.call("queryAll", json!([Self::scope_arg(scope), selector]))?;
        Ok(found.into_iter().map(NodeId).collect())
    }

    fn shadow_hosts(&self, scope: Scope) -> Result<Vec<NodeId>> {
        let found: Vec<usize> = self.call("shadowHosts", json!([Self::scope_arg(scope)]))?;
        Ok(found.into_iter().map(NodeId).collect())
    }

    fn tag_name(&self, node: NodeId) -> Result<String> {
        self.call("tagName", json!([node.0]))
    }

    fn attribute(&self, node: NodeId, name: &str) -> Result<Option<String>> {
        self.call("attribute", json!([node.0, name]))
    }

    fn text(&self, node: NodeId) -> Result<String> {
        self.call("text", json!([node.0]))
    }

    fn is_visible(&self, node: NodeId) -> Result<bool> {
        self.call("isVisible", json!([node.0]))
    }

    fn is_checked(&self, node: NodeId) -> Result<bool> {
        self.call("isChecked", json!([node.0]))
    }

    fn set_value(&mut self, node: NodeId, value: &str) -> Result<()> {
        self.call::<Value>("setValue", json!([node.0, value])).map(|_| ())
    }

    fn select_option(&mut self, node: NodeId, wanted: &str) -> Result<bool> {
        self.call("selectOption", json!([node.0, wanted]))
    }

    fn click(&mut self, node: NodeId) -> Result<()> {
        self.call::<Value>("click", json!([node.0])).map(|_| ())
    }

    fn dispatch_event(&mut self, node: NodeId, event: DomEvent) -> Result<()> {
        self.call::<Value>("dispatch", json!([node.0, event.name()])).map(|_| ())
    }

    fn dispatch_drag(&mut self, node: NodeId, kind: DragKind, files: &[ImageFile]) -> Result<()> {
        self.call::<Value>("drag", json!([node.0, kind.name(), Self::files_arg(files)]))
            .map(|_| ())
    }

    fn assign_files(&mut self, node: NodeId, files: &[ImageFile]) -> Result<()> {
        self.call::<Value>("assignFiles", json!([node.0, Self::files_arg(files)]))
            .map(|_| ())
    }
}
