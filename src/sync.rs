//! CRM sync and authentication
//!
//! [`CrmClient`] talks to the agency CRM: bearer-token exchange against the ambient
//! cookie session, paginated property listing and theme fetch. Failures are classified
//! into [`CrmError`], each with a fixed [`ErrorCode`] and remediation message.
//!
//! [`SyncOrchestrator`] drives the `idle -> loading -> success | error` cycle and stores
//! the result in the [`ExtensionContext`].

use crate::config::normalize_base_url;
use crate::error::Result;
use crate::messaging::{ErrorCode, ErrorInfo};
use crate::model::{PropertyRecord, Theme};
use crate::state::{ExtensionContext, SyncStatus};
use crate::storage::{self, Storage, keys};
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::sync::Mutex;

pub const THEME_PATH: &str = "/api/extension/theme/";
pub const PROPERTIES_PATH: &str = "/api/extension/properties/";
pub const TOKEN_PATH: &str = "/api/auth/token/";
pub const TOKEN_VERIFY_PATH: &str = "/api/auth/token/verify/";

/// Properties per page
pub const PAGE_SIZE: usize = 200;

/// Safety stop for servers that never return a short page
const MAX_PAGES: usize = 500;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Path fragment of the tenant-facing portal, which cannot serve extension data
const RESTRICTED_PATH: &str = "tenant-portal";

/// Sync and authentication failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CrmError {
    #[error("No CRM URL configured")]
    NoUrl,

    #[error("Invalid CRM URL '{0}'")]
    InvalidUrl(String),

    #[error("CRM URL points at the tenant portal: {0}")]
    TenantPortalUrl(String),

    #[error("Expected JSON from {url} but received HTML (status {status})")]
    HtmlResponse { url: String, status: u16 },

    #[error("Not signed in to the CRM")]
    NotSignedIn,

    #[error("Network error: {0}")]
    Network(String),

    #[error("The CRM answered with the tenant portal")]
    TenantPortal,

    #[error("CRM returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Unexpected CRM response: {0}")]
    InvalidResponse(String),
}

impl CrmError {
    pub fn code(&self) -> ErrorCode {
        match self {
            CrmError::NoUrl | CrmError::InvalidUrl(_) => ErrorCode::NoUrl,
            CrmError::TenantPortalUrl(_) => ErrorCode::TenantPortalUrl,
            CrmError::HtmlResponse { .. } | CrmError::InvalidResponse(_) => ErrorCode::HtmlResponse,
            CrmError::NotSignedIn => ErrorCode::NotSignedIn,
            CrmError::Network(_) | CrmError::Status { .. } => ErrorCode::NetworkError,
            CrmError::TenantPortal => ErrorCode::TenantPortalError,
        }
    }

    /// What the user should do about it
    pub fn remediation(&self) -> String {
        match self {
            CrmError::NoUrl | CrmError::InvalidUrl(_) => "Set your CRM URL in the extension options.".into(),
            CrmError::TenantPortalUrl(_) => {
                "This is the tenant portal URL. Use your agency CRM URL in the extension options.".into()
            }
            CrmError::HtmlResponse { .. } | CrmError::InvalidResponse(_) => {
                "The CRM returned a web page instead of data. Check the CRM URL in the extension options.".into()
            }
            CrmError::NotSignedIn => "Sign in to the CRM in this browser, then sync again.".into(),
            CrmError::Network(_) | CrmError::Status { .. } => {
                format!("Could not reach the CRM. Check your connection and try again. ({})", self)
            }
            CrmError::TenantPortal => {
                "The CRM redirected to the tenant portal. Sign in with an agency account.".into()
            }
        }
    }
}

impl From<&CrmError> for ErrorInfo {
    fn from(error: &CrmError) -> Self {
        ErrorInfo::new(error.code(), error.remediation())
    }
}

/// Validate a configured base URL before any request is made
pub fn check_base_url(base_url: &str) -> std::result::Result<url::Url, CrmError> {
    let normalized = normalize_base_url(base_url);
    if normalized.is_empty() {
        return Err(CrmError::NoUrl);
    }
    let url = url::Url::parse(&normalized).map_err(|_| CrmError::InvalidUrl(base_url.to_string()))?;
    if url.path().to_ascii_lowercase().contains(RESTRICTED_PATH) {
        return Err(CrmError::TenantPortalUrl(normalized));
    }
    Ok(url)
}

/// Classify an HTML body received where JSON was expected
pub fn classify_html(status: u16, body: &str, url: &str) -> CrmError {
    let body = body.to_ascii_lowercase();
    if body.contains(RESTRICTED_PATH) {
        CrmError::TenantPortal
    } else if status == 401 || status == 403 || body.contains("login") {
        CrmError::NotSignedIn
    } else {
        CrmError::HtmlResponse {
            url: url.to_string(),
            status,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PropertyPage {
    List(Vec<PropertyRecord>),
    Paged { results: Vec<PropertyRecord> },
}

impl PropertyPage {
    fn into_records(self) -> Vec<PropertyRecord> {
        match self {
            PropertyPage::List(records) | PropertyPage::Paged { results: records } => records,
        }
    }
}

#[derive(Deserialize)]
struct TokenReply {
    token: String,
}

/// Authenticated CRM access for one base URL
pub struct CrmClient {
    http: reqwest::Client,
    base: String,
    storage: Arc<dyn Storage>,
    token_lock: Mutex<()>,
}

impl CrmClient {
    /// Validates `base_url`; fails without touching the network when it is unusable
    pub fn new(base_url: &str, storage: Arc<dyn Storage>) -> std::result::Result<Self, CrmError> {
        let base = check_base_url(base_url)?;
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| CrmError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base: base.as_str().trim_end_matches('/').to_string(),
            storage,
            token_lock: Mutex::new(()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn cached_token(&self) -> Option<String> {
        match storage::load::<String>(self.storage.as_ref(), keys::AUTH_TOKEN).await {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                log::warn!("Ignoring unreadable auth token: {}", e);
                None
            }
        }
    }

    async fn store_token(&self, token: Option<&str>) {
        let result = match token {
            Some(token) => storage::save(self.storage.as_ref(), keys::AUTH_TOKEN, token).await,
            None => self.storage.remove(&[keys::AUTH_TOKEN]).await,
        };
        if let Err(e) = result {
            log::warn!("Failed to persist auth token: {}", e);
        }
    }

    /// Exchange the cookie session for a bearer token. `None` when the server declines.
    async fn exchange_token(&self) -> Option<String> {
        let response = match self.http.post(self.endpoint(TOKEN_PATH)).send().await {
            Ok(response) => response,
            Err(e) => {
                log::debug!("Token exchange failed: {}", e);
                return None;
            }
        };
        if !response.status().is_success() {
            log::debug!("Token exchange declined with status {}", response.status());
            return None;
        }
        match response.json::<TokenReply>().await {
            Ok(reply) if !reply.token.is_empty() => {
                log::info!("Obtained CRM token");
                self.store_token(Some(&reply.token)).await;
                Some(reply.token)
            }
            Ok(_) => None,
            Err(e) => {
                log::debug!("Token exchange returned an unexpected body: {}", e);
                None
            }
        }
    }

    /// Cached token, or a freshly exchanged one; `None` means cookies only
    async fn token(&self) -> Option<String> {
        let _guard = self.token_lock.lock().await;
        match self.cached_token().await {
            Some(token) => Some(token),
            None => self.exchange_token().await,
        }
    }

    /// Replace a token the server rejected. Concurrent callers share one refresh.
    async fn refresh_token(&self, rejected: &str) -> Option<String> {
        let _guard = self.token_lock.lock().await;
        if let Some(current) = self.cached_token().await.filter(|t| t != rejected) {
            return Some(current);
        }
        self.store_token(None).await;
        self.exchange_token().await
    }

    async fn send_get(&self, url: &str, token: Option<&str>) -> std::result::Result<reqwest::Response, CrmError> {
        let mut request = self.http.get(url).header(reqwest::header::ACCEPT, "application/json");
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.map_err(|e| CrmError::Network(e.to_string()))
    }

    /// GET `url` as JSON. A 401 on a token triggers one refresh and one retry.
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> std::result::Result<T, CrmError> {
        let token = self.token().await;
        let mut response = self.send_get(url, token.as_deref()).await?;

        let rejected = token.as_deref().filter(|_| response.status() == StatusCode::UNAUTHORIZED);
        if let Some(rejected) = rejected {
            log::warn!("CRM rejected the token for {}; refreshing once", url);
            let Some(fresh) = self.refresh_token(rejected).await else {
                return Err(CrmError::NotSignedIn);
            };
            response = self.send_get(url, Some(&fresh)).await?;
            if response.status() == StatusCode::UNAUTHORIZED {
                log::warn!("Refreshed token rejected for {}", url);
                return Err(CrmError::NotSignedIn);
            }
        }

        Self::decode(url, response).await
    }

    async fn decode<T: DeserializeOwned>(url: &str, response: reqwest::Response) -> std::result::Result<T, CrmError> {
        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let body = response.text().await.map_err(|e| CrmError::Network(e.to_string()))?;

        if content_type.contains("text/html") || body.trim_start().starts_with('<') {
            let error = classify_html(status.as_u16(), &body, url);
            log::warn!("HTML response from {}: {}", url, error);
            return Err(error);
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(CrmError::NotSignedIn);
        }
        if !status.is_success() {
            return Err(CrmError::Status {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }
        serde_json::from_str(&body).map_err(|e| CrmError::InvalidResponse(e.to_string()))
    }

    pub async fn fetch_theme(&self) -> std::result::Result<Theme, CrmError> {
        self.get_json(&self.endpoint(THEME_PATH)).await
    }

    /// All properties, following `offset` until a short page comes back
    pub async fn fetch_properties(&self) -> std::result::Result<Vec<PropertyRecord>, CrmError> {
        let mut records = Vec::new();
        for page in 0..MAX_PAGES {
            let offset = page * PAGE_SIZE;
            let url = format!("{}?limit={}&offset={}", self.endpoint(PROPERTIES_PATH), PAGE_SIZE, offset);
            let batch = self.get_json::<PropertyPage>(&url).await?.into_records();
            let len = batch.len();
            log::debug!("Fetched {} properties at offset {}", len, offset);
            records.extend(batch);
            if len < PAGE_SIZE {
                return Ok(records);
            }
        }
        log::warn!("Stopped paging after {} pages", MAX_PAGES);
        Ok(records)
    }

    /// Whether the cached token is still accepted. No token means `false`.
    pub async fn verify_token(&self) -> std::result::Result<bool, CrmError> {
        let Some(token) = self.cached_token().await else {
            return Ok(false);
        };
        let response = self
            .http
            .post(self.endpoint(TOKEN_VERIFY_PATH))
            .json(&serde_json::json!({ "token": token }))
            .send()
            .await
            .map_err(|e| CrmError::Network(e.to_string()))?;
        Ok(response.status().is_success())
    }
}

/// Outcome of a successful sync
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSummary {
    pub properties: usize,
    /// False when the theme fetch failed and the cached theme was kept
    pub theme_updated: bool,
}

fn unix_now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs())
}

/// Runs syncs against the CRM configured in the context
#[derive(Clone)]
pub struct SyncOrchestrator {
    ctx: Arc<ExtensionContext>,
}

impl SyncOrchestrator {
    pub fn new(ctx: Arc<ExtensionContext>) -> Self {
        Self { ctx }
    }

    async fn fetch(&self, base_url: &str) -> std::result::Result<(Option<Theme>, Vec<PropertyRecord>), CrmError> {
        let client = CrmClient::new(base_url, self.ctx.storage().clone())?;
        log::info!("Syncing from {}", client.base_url());

        let (theme, properties) = tokio::join!(client.fetch_theme(), client.fetch_properties());
        let properties = properties?;
        let theme = match theme {
            Ok(theme) => Some(theme),
            Err(e) => {
                log::warn!("Theme fetch failed, keeping cached theme: {}", e);
                None
            }
        };
        Ok((theme, properties))
    }

    /// Fetch theme and properties and store them. On failure the state ends in `error`
    /// with the classified cause.
    pub async fn sync(&self) -> Result<SyncSummary> {
        let base_url = self.ctx.snapshot().await?.settings.base_url;
        self.ctx
            .update(|s| {
                s.set_sync_status(SyncStatus::Loading);
                s.last_error = None;
            })
            .await?;

        match self.fetch(&base_url).await {
            Ok((theme, properties)) => {
                let summary = SyncSummary {
                    properties: properties.len(),
                    theme_updated: theme.is_some(),
                };
                self.ctx
                    .update(|s| {
                        if let Some(theme) = theme {
                            s.theme = Some(theme);
                        }
                        s.replace_properties(properties);
                        s.last_sync = Some(unix_now());
                        s.set_sync_status(SyncStatus::Success);
                    })
                    .await?;
                log::info!("Sync finished with {} properties", summary.properties);
                Ok(summary)
            }
            Err(e) => {
                log::warn!("Sync failed ({:?}): {}", e.code(), e);
                let info = ErrorInfo::from(&e);
                self.ctx
                    .update(|s| {
                        s.last_error = Some(info);
                        s.set_sync_status(SyncStatus::Error);
                    })
                    .await?;
                Err(e.into())
            }
        }
    }
}
