use crate::browser::config::{ConnectionOptions, LaunchOptions};
use crate::error::{AutofillError, Result};
use headless_chrome::{Browser, Tab};
use std::{ffi::OsStr, sync::Arc, time::Duration};

/// A Chrome/Chromium instance the engine drives
pub struct BrowserSession {
    browser: Browser,
}

impl BrowserSession {
    /// Launch a new browser instance with the given options
    pub fn launch(options: LaunchOptions) -> Result<Self> {
        let mut launch_opts = headless_chrome::LaunchOptions::default();

        // Listing sites refuse or degrade sessions that advertise automation
        launch_opts.ignore_default_args.push(OsStr::new("--enable-automation"));
        launch_opts.args.push(OsStr::new("--disable-blink-features=AutomationControlled"));

        // Filling a long listing form by hand between commands easily exceeds the 30s default
        launch_opts.idle_browser_timeout = Duration::from_secs(60 * 60);

        launch_opts.headless = options.headless;
        launch_opts.window_size = Some((options.window_width, options.window_height));
        launch_opts.path = options.chrome_path;
        launch_opts.user_data_dir = options.user_data_dir;
        launch_opts.sandbox = options.sandbox;

        let browser = Browser::new(launch_opts).map_err(|e| AutofillError::LaunchFailed(e.to_string()))?;
        browser
            .new_tab()
            .map_err(|e| AutofillError::LaunchFailed(format!("Failed to create tab: {}", e)))?;

        log::info!("Launched browser (headless: {})", options.headless);
        Ok(Self { browser })
    }

    /// Attach to a running browser via its DevTools WebSocket
    pub fn connect(options: ConnectionOptions) -> Result<Self> {
        let browser = Browser::connect_with_timeout(options.ws_url.clone(), Duration::from_millis(options.timeout))
            .map_err(|e| AutofillError::ConnectionFailed(e.to_string()))?;

        log::info!("Connected to browser at {}", options.ws_url);
        Ok(Self { browser })
    }

    pub fn browser(&self) -> &Browser {
        &self.browser
    }

    pub fn get_tabs(&self) -> Result<Vec<Arc<Tab>>> {
        let tabs = self
            .browser
            .get_tabs()
            .lock()
            .map_err(|e| AutofillError::TabOperationFailed(format!("Failed to get tabs: {}", e)))?
            .clone();

        Ok(tabs)
    }

    /// The tab the user is looking at: visible and focused if possible, else just visible
    pub fn get_active_tab(&self) -> Result<Arc<Tab>> {
        let tabs = self.get_tabs()?;

        for script in [
            "document.visibilityState === 'visible' && document.hasFocus()",
            "document.visibilityState === 'visible'",
        ] {
            for tab in &tabs {
                match tab.evaluate(script, false) {
                    Ok(remote) if remote.value.as_ref().and_then(|v| v.as_bool()).unwrap_or(false) => {
                        return Ok(tab.clone());
                    }
                    Ok(_) => {}
                    Err(e) => log::debug!("Failed to check tab status: {}", e),
                }
            }
        }

        // A single headless tab never reports focus
        match tabs.as_slice() {
            [only] => Ok(only.clone()),
            _ => Err(AutofillError::TabOperationFailed("No active tab found".to_string())),
        }
    }

    /// Tab by its DevTools target id
    pub fn tab_by_id(&self, id: &str) -> Result<Arc<Tab>> {
        self.get_tabs()?
            .into_iter()
            .find(|tab| tab.get_target_id() == id)
            .ok_or_else(|| AutofillError::TabOperationFailed(format!("Tab {} is gone", id)))
    }

    /// Navigate the active tab and wait for the load to finish
    pub fn open(&self, url: &str) -> Result<Arc<Tab>> {
        let tab = self.get_active_tab()?;
        tab.navigate_to(url)
            .map_err(|e| AutofillError::TabOperationFailed(format!("Failed to navigate to {}: {}", url, e)))?;
        tab.wait_until_navigated()
            .map_err(|e| AutofillError::TabOperationFailed(format!("Navigation timeout: {}", e)))?;
        Ok(tab)
    }

    /// Close every tab; the process exits when the session is dropped
    pub fn close(&self) -> Result<()> {
        for tab in self.get_tabs()? {
            if let Err(e) = tab.close(false) {
                log::debug!("Failed to close tab: {}", e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_options_builder() {
        let opts = LaunchOptions::new()
            .headless(false)
            .window_size(800, 600)
            .user_data_dir("/tmp/axis-profile");

        assert!(!opts.headless);
        assert_eq!(opts.window_width, 800);
        assert_eq!(opts.window_height, 600);
        assert_eq!(opts.user_data_dir.as_deref(), Some(std::path::Path::new("/tmp/axis-profile")));
    }

    #[test]
    fn test_connection_options() {
        let opts = ConnectionOptions::new("ws://localhost:9222").timeout(5000);

        assert_eq!(opts.ws_url, "ws://localhost:9222");
        assert_eq!(opts.timeout, 5000);
    }

    // Require Chrome; run with: cargo test -- --ignored
    #[test]
    #[ignore]
    fn test_get_active_tab() {
        let session = BrowserSession::launch(LaunchOptions::new().headless(true)).expect("Failed to launch browser");
        assert!(session.get_active_tab().is_ok());
    }

    #[test]
    #[ignore]
    fn test_open_blank() {
        let session = BrowserSession::launch(LaunchOptions::new().headless(true)).expect("Failed to launch browser");
        let tab = session.open("about:blank").expect("Failed to navigate");
        assert_eq!(session.tab_by_id(tab.get_target_id()).unwrap().get_url(), tab.get_url());
    }
}
