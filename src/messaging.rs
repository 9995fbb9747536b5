//! Background message protocol
//!
//! Requests from the popup/options surfaces to the background process, and the
//! responses they get back. Every response carries `success`; failures carry an
//! [`ErrorInfo`] whose code comes from the closed [`ErrorCode`] set.

use crate::error::AutofillError;
use crate::model::SettingsPatch;
use crate::runtime::{AutofillReply, ContentMessage, ContentResponse};
use crate::state::ExtensionState;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Requests handled by the background process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum RuntimeMessage {
    GetState,
    SyncData,
    /// `None` clears the selection
    SetSelectedProperty {
        property_id: Option<String>,
    },
    AutofillActiveTab {
        /// Adapter key; resolved from the tab URL when absent
        #[serde(default)]
        site: Option<String>,
    },
    UpdateSettings {
        settings: SettingsPatch,
    },
    Logout,
}

impl RuntimeMessage {
    pub fn name(&self) -> &'static str {
        match self {
            RuntimeMessage::GetState => "GET_STATE",
            RuntimeMessage::SyncData => "SYNC_DATA",
            RuntimeMessage::SetSelectedProperty { .. } => "SET_SELECTED_PROPERTY",
            RuntimeMessage::AutofillActiveTab { .. } => "AUTOFILL_ACTIVE_TAB",
            RuntimeMessage::UpdateSettings { .. } => "UPDATE_SETTINGS",
            RuntimeMessage::Logout => "LOGOUT",
        }
    }
}

/// Closed failure taxonomy shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// No CRM base URL configured
    NoUrl,
    /// Base URL points at the tenant portal instead of the agency CRM
    TenantPortalUrl,
    /// HTML where JSON was expected
    HtmlResponse,
    NotSignedIn,
    NetworkError,
    /// The server answered with the tenant portal
    TenantPortalError,
    PropertyNotFound,
    UnsupportedSite,
    ContentScriptNotReady,
    CommunicationFailed,
    NoPropertySelected,
    Internal,
}

/// Failure detail of a response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<&AutofillError> for ErrorInfo {
    fn from(error: &AutofillError) -> Self {
        match error {
            AutofillError::Crm(e) => ErrorInfo::new(e.code(), e.remediation()),
            AutofillError::UnsupportedSite(_) => ErrorInfo::new(ErrorCode::UnsupportedSite, "Unsupported site"),
            AutofillError::UnsupportedPage(_) => ErrorInfo::new(ErrorCode::ContentScriptNotReady, error.to_string()),
            _ if error.is_runtime_unavailable() => ErrorInfo::new(
                ErrorCode::ContentScriptNotReady,
                "Content script not ready. Refresh the page and try again.",
            ),
            AutofillError::Communication(_) => ErrorInfo::new(ErrorCode::CommunicationFailed, error.to_string()),
            _ => ErrorInfo::new(ErrorCode::Internal, error.to_string()),
        }
    }
}

/// Reply to a [`RuntimeMessage`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<ExtensionState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autofill: Option<AutofillReply>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl RuntimeResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            state: None,
            autofill: None,
            error: None,
        }
    }

    pub fn with_state(state: ExtensionState) -> Self {
        Self {
            success: true,
            message: None,
            state: Some(state),
            autofill: None,
            error: None,
        }
    }

    pub fn failure(error: ErrorInfo) -> Self {
        Self {
            success: false,
            message: Some(error.message.clone()),
            state: None,
            autofill: None,
            error: Some(error),
        }
    }

    pub fn from_error(error: &AutofillError) -> Self {
        Self::failure(ErrorInfo::from(error))
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        self.error.as_ref().map(|e| e.code)
    }
}

#[derive(JsonSchema)]
#[allow(dead_code)]
struct Protocol {
    runtime_message: RuntimeMessage,
    runtime_response: RuntimeResponse,
    content_message: ContentMessage,
    content_response: ContentResponse,
}

/// JSON schema of every message type, for UI surfaces
pub fn protocol_schema() -> serde_json::Value {
    serde_json::to_value(schemars::schema_for!(Protocol)).unwrap_or_default()
}
