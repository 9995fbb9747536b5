//! axis-autofill command line
//!
//! Drives the background message handlers from a terminal: sync the CRM, pick a
//! property and fill the listing form open in a Chrome tab.

use anyhow::{Context, bail};
use async_trait::async_trait;
use axis_autofill::{
    AdapterContext, AdapterRegistry, AutofillError, Background, BrowserSession, ChromeTabHost, ConnectionOptions,
    ContentMessage, ContentResponse, CrmClient, EngineConfig, ExtensionContext, HttpImageFetcher, JsonFileStorage,
    LaunchOptions, RuntimeMessage, RuntimeResponse, SettingsPatch, TabHost, TabInfo,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "axis-autofill")]
#[command(version)]
#[command(about = "Fill listing-site forms with properties synced from the agency CRM", long_about = None)]
struct Cli {
    /// CRM base URL; saved to settings before the command runs
    #[arg(long, value_name = "URL", global = true)]
    base_url: Option<String>,

    /// State file
    #[arg(long, value_name = "PATH", default_value = "axis-autofill.json", global = true)]
    store: PathBuf,

    /// Engine configuration (JSON); production defaults when absent
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Launch the browser in headed mode (default: headless)
    #[arg(long, short = 'H', global = true)]
    headed: bool,

    /// Persistent browser profile directory, so site logins survive restarts
    #[arg(long, value_name = "DIR", global = true)]
    user_data_dir: Option<PathBuf>,

    /// Attach to a running browser instead of launching one
    #[arg(long, value_name = "URL", global = true)]
    ws_endpoint: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Pull the theme and properties from the CRM
    Sync,
    /// Print the current state as JSON
    State,
    /// Select a property by id; no id clears the selection
    Select { id: Option<String> },
    /// Fill the active tab with the selected property
    Autofill {
        /// Adapter key (bayut, dubizzle, propertyfinder, justproperty)
        #[arg(long)]
        site: Option<String>,
        /// Navigate to this URL first
        #[arg(long)]
        url: Option<String>,
    },
    /// Clear all stored data
    Logout,
    /// Show configuration, sync and sign-in status
    Status,
    /// Print the JSON schema of the message protocol
    Schema,
}

/// Host used by commands that never touch a tab
struct Detached;

#[async_trait]
impl TabHost for Detached {
    async fn active_tab(&self) -> axis_autofill::Result<TabInfo> {
        Err(AutofillError::TabOperationFailed("No browser attached".into()))
    }

    async fn inject_runtime(&self, _tab: &TabInfo) -> axis_autofill::Result<()> {
        Err(AutofillError::TabOperationFailed("No browser attached".into()))
    }

    async fn send(&self, _tab: &TabInfo, _message: ContentMessage) -> axis_autofill::Result<ContentResponse> {
        Err(AutofillError::TabOperationFailed("No browser attached".into()))
    }
}

fn browser(cli: &Cli) -> axis_autofill::Result<BrowserSession> {
    match &cli.ws_endpoint {
        Some(ws) => BrowserSession::connect(ConnectionOptions::new(ws.clone())),
        None => {
            let mut options = LaunchOptions::new().headless(!cli.headed);
            if let Some(dir) = &cli.user_data_dir {
                options = options.user_data_dir(dir.clone());
            }
            BrowserSession::launch(options)
        }
    }
}

fn report(response: &RuntimeResponse) -> anyhow::Result<()> {
    if response.success {
        if let Some(message) = &response.message {
            println!("{}", message);
        }
        if let Some(reply) = &response.autofill {
            for warning in &reply.warnings {
                println!("warning: {}", warning);
            }
        }
        Ok(())
    } else {
        let code = response
            .error_code()
            .map(|c| format!("{:?}", c))
            .unwrap_or_else(|| "UNKNOWN".into());
        bail!("{} ({})", response.message.as_deref().unwrap_or("Request failed"), code)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .await
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => EngineConfig::production(),
    };

    let ctx = Arc::new(ExtensionContext::new(Arc::new(JsonFileStorage::new(&cli.store))));

    let host: Arc<dyn TabHost> = match &cli.command {
        Command::Autofill { url, .. } => {
            let session = Arc::new(browser(&cli)?);
            if let Some(url) = url {
                session.open(url)?;
            }
            let fetcher = Arc::new(HttpImageFetcher::new(config.upload.fetch_timeout())?);
            Arc::new(ChromeTabHost::new(
                session,
                AdapterRegistry::default(),
                AdapterContext::from_config(fetcher, &config),
            ))
        }
        _ => Arc::new(Detached),
    };
    let background = Background::new(ctx.clone(), host, &config);

    if let Some(base_url) = &cli.base_url {
        let patch = SettingsPatch {
            base_url: Some(base_url.clone()),
            ..Default::default()
        };
        report(&background.handle(RuntimeMessage::UpdateSettings { settings: patch }).await)?;
    }

    match cli.command {
        Command::Sync => report(&background.handle(RuntimeMessage::SyncData).await),
        Command::State => {
            let response = background.handle(RuntimeMessage::GetState).await;
            if let Some(state) = &response.state {
                println!("{}", serde_json::to_string_pretty(state)?);
            }
            report(&response)
        }
        Command::Select { id } => {
            report(&background.handle(RuntimeMessage::SetSelectedProperty { property_id: id }).await)
        }
        Command::Autofill { site, .. } => {
            if let Some(Ok(summary)) = background.startup().await {
                println!("Synced {} properties", summary.properties);
            }
            report(&background.handle(RuntimeMessage::AutofillActiveTab { site }).await)
        }
        Command::Logout => report(&background.handle(RuntimeMessage::Logout).await),
        Command::Schema => {
            println!("{}", serde_json::to_string_pretty(&axis_autofill::messaging::protocol_schema())?);
            Ok(())
        }
        Command::Status => {
            let state = ctx.snapshot().await?;
            let base_url = if state.settings.base_url.is_empty() {
                "(not set)"
            } else {
                state.settings.base_url.as_str()
            };
            println!("CRM:        {}", base_url);
            println!("Properties: {}", state.properties.len());
            println!(
                "Selected:   {}",
                state.selected_property().map(|p| p.title.as_str()).unwrap_or("(none)")
            );
            match state.last_sync {
                Some(at) => println!("Last sync:  {} (unix)", at),
                None => println!("Last sync:  never"),
            }
            if !state.settings.base_url.is_empty() {
                let client = CrmClient::new(&state.settings.base_url, ctx.storage().clone())?;
                match client.verify_token().await {
                    Ok(true) => println!("Signed in:  yes"),
                    Ok(false) => println!("Signed in:  no"),
                    Err(e) => println!("Signed in:  unknown ({})", e),
                }
            }
            Ok(())
        }
    }
}
