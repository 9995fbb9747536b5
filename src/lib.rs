//! # axis-autofill
//!
//! Fills third-party real-estate listing forms with property data synced from an agency CRM.
//!
//! ## Features
//!
//! - **CRM sync**: token or cookie authenticated, paginated property and theme sync
//! - **Site adapters**: Bayut, Dubizzle, Property Finder and JustProperty form profiles
//! - **Resilient field location**: ordered selector fallbacks, label and shadow-root search
//! - **Image upload automation**: direct, multi-step, drag-drop and hidden-input uploads
//!   with per-platform validation
//! - **Readiness handshake**: runtime injection with bounded, backed-off ping polling
//!
//! ## Driving a browser
//!
//! ```rust,no_run
//! use axis_autofill::{
//!     AdapterContext, AdapterRegistry, Background, BrowserSession, ChromeTabHost, EngineConfig,
//!     ExtensionContext, HttpImageFetcher, JsonFileStorage, LaunchOptions, RuntimeMessage,
//! };
//! use std::sync::Arc;
//!
//! # async fn run() -> axis_autofill::Result<()> {
//! let config = EngineConfig::production();
//! let session = Arc::new(BrowserSession::launch(LaunchOptions::new().headless(false))?);
//! let fetcher = Arc::new(HttpImageFetcher::new(config.upload.fetch_timeout())?);
//! let host = Arc::new(ChromeTabHost::new(
//!     session,
//!     AdapterRegistry::default(),
//!     AdapterContext::from_config(fetcher, &config),
//! ));
//!
//! let ctx = Arc::new(ExtensionContext::new(Arc::new(JsonFileStorage::new("axis-store.json"))));
//! let background = Background::new(ctx, host, &config);
//!
//! let response = background.handle(RuntimeMessage::SyncData).await;
//! println!("{:?}", response.message);
//! # Ok(())
//! # }
//! ```
//!
//! ## Offline pages
//!
//! [`DomTree`] implements the same [`PageDom`] interface in memory, so adapters and
//! the upload executor can run against fixtures:
//!
//! ```rust
//! use axis_autofill::{DomTree, ElementNode, locator::{self, FieldType}};
//!
//! let page = DomTree::new(
//!     "https://www.bayut.com/post-ad",
//!     ElementNode::new("form").with_child(ElementNode::input("text").with_attr("name", "price")),
//! );
//! assert!(locator::locate(&page, FieldType::Price, false).is_some());
//! ```
//!
//! ## Module Overview
//!
//! - [`background`]: message handling for the popup and options surfaces
//! - [`sync`]: CRM client and sync orchestration
//! - [`state`] / [`storage`]: process-wide state and its persistence
//! - [`inject`]: runtime injection and readiness polling
//! - [`runtime`]: the in-page content runtime
//! - [`adapters`]: per-site form filling
//! - [`locator`], [`upload`], [`images`]: field location, uploads and image validation
//! - [`dom`]: the page capability interface and its in-memory implementation
//! - [`browser`]: Chrome session and the live [`PageDom`] implementation

pub mod adapters;
pub mod background;
pub mod browser;
pub mod config;
pub mod dom;
pub mod error;
pub mod images;
pub mod inject;
pub mod locator;
pub mod messaging;
pub mod model;
pub mod runtime;
pub mod state;
pub mod storage;
pub mod sync;
pub mod upload;

pub use adapters::{AdapterContext, AdapterRegistry, AutofillReport, SiteAdapter};
pub use background::Background;
pub use browser::{BrowserSession, ChromePage, ChromeTabHost, ConnectionOptions, LaunchOptions};
pub use config::EngineConfig;
pub use dom::{DomTree, ElementNode, NodeId, PageDom, Scope};
pub use error::{AutofillError, Result};
pub use inject::{ReadinessOrchestrator, TabHost, TabInfo};
pub use messaging::{ErrorCode, ErrorInfo, RuntimeMessage, RuntimeResponse};
pub use model::{AutofillPayload, PropertyRecord, Settings, SettingsPatch, Theme};
pub use runtime::{ContentMessage, ContentResponse, ContentRuntime};
pub use state::{ExtensionContext, ExtensionState, SyncStatus};
pub use storage::{JsonFileStorage, MemoryStorage, Storage};
pub use sync::{CrmClient, CrmError, SyncOrchestrator, SyncSummary};
pub use upload::{HttpImageFetcher, ImageFetcher, UploadExecutor};
