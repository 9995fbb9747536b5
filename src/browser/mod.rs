//! Live browser backend
//!
//! [`BrowserSession`] launches or attaches to Chrome over the DevTools protocol,
//! [`ChromePage`] implements [`PageDom`](crate::dom::PageDom) against a tab through an
//! injected JS bridge, and [`ChromeTabHost`] plugs both into the readiness handshake.

pub mod config;
pub mod host;
pub mod page;
pub mod session;

pub use config::{ConnectionOptions, LaunchOptions};
pub use host::ChromeTabHost;
pub use page::ChromePage;
pub use session::BrowserSession;
