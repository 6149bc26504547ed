use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow, bail};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use ovex_core::{
    AutomationConfig, Container, Document, Extraction, FetchConfig, FileStore, HtmlPage, JsonConfig, KeyValueStore,
    Message, Orchestrator, SettingsManager, WebhookData, WebhookManager, download_markdown,
    extraction_to_json, load_snapshot,
};
use owo_colors::OwoColorize;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

mod echo;

use echo::{
    TerminalPresenter, format_size, print_banner, print_breakers, print_error, print_extraction_details, print_info,
    print_step, print_success,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Output format for extracted content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Markdown,
    Html,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "html" => Ok(Self::Html),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid format: {}. Valid options: markdown, html, json", s)),
        }
    }
}

/// Expand, extract and deliver search-engine AI overview panels
#[derive(Parser, Debug)]
#[command(name = "ovex")]
#[command(version)]
#[command(about = "Expand, extract and deliver search-engine AI overview panels", long_about = None)]
struct Cli {
    /// Key-value store file (default: ~/.config/ovex/storage.json)
    #[arg(long, global = true, env = "OVEX_STORE", value_name = "FILE")]
    store: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract the overview and its sources from a results-page snapshot
    Extract(ExtractArgs),
    /// Run the automation pipeline against a snapshot and report the final state
    Automate(AutomateArgs),
    /// Show or change the automation settings
    #[command(subcommand)]
    Settings(SettingsCommand),
    /// Show, change or test the webhook
    #[command(subcommand)]
    Webhook(WebhookCommand),
    /// Feed a settings message to a page context and print the acknowledgement
    Message {
        /// e.g. '{"type":"SETTINGS_RESET"}'
        #[arg(value_name = "JSON")]
        json: String,
    },
    /// Print shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(clap::Args, Debug)]
struct SnapshotArgs {
    /// URL to fetch, saved HTML file, or "-" for stdin
    #[arg(value_name = "INPUT")]
    input: String,

    /// Results-page URL the search query is read from
    #[arg(long, value_name = "URL")]
    page_url: Option<String>,

    /// HTTP timeout in seconds
    #[arg(long, default_value = "30", value_name = "SECS")]
    timeout: u64,

    /// Custom User-Agent for HTTP requests
    #[arg(long, value_name = "UA")]
    user_agent: Option<String>,
}

#[derive(clap::Args, Debug)]
struct ExtractArgs {
    #[command(flatten)]
    snapshot: SnapshotArgs,

    /// Output file (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Output format (markdown, html, json)
    #[arg(short, long, default_value = "markdown", value_name = "FORMAT")]
    format: OutputFormat,

    /// Also save the Markdown as ai-overview-<millis>.md in DIR
    #[arg(long, value_name = "DIR")]
    download: Option<PathBuf>,

    /// Send the extraction to the configured webhook
    #[arg(long)]
    send: bool,
}

#[derive(clap::Args, Debug)]
struct AutomateArgs {
    #[command(flatten)]
    snapshot: SnapshotArgs,

    /// Upper bound on each automation stage, in seconds
    #[arg(long, default_value = "60", value_name = "SECS")]
    stage_timeout: u64,

    /// Print the final status as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum SettingsCommand {
    /// Print the current settings
    Show,
    /// Set one setting, e.g. `autoSendWebhook true`
    Set { key: String, value: String },
    /// Restore the defaults
    Reset,
    /// Remove the stored record
    Clear,
    /// Print the settings as JSON, or write them to FILE
    Export {
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Load settings from a JSON file, or "-" for stdin
    Import {
        #[arg(value_name = "FILE")]
        input: String,
    },
}

#[derive(Subcommand, Debug)]
enum WebhookCommand {
    /// Print the configured URL
    Show,
    /// Validate and store the URL
    Set { url: String },
    /// Forget the URL
    Remove,
    /// POST a test payload to URL, or to the configured URL
    Test { url: Option<String> },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .init();
}

fn open_store(path: Option<PathBuf>) -> anyhow::Result<Arc<dyn KeyValueStore>> {
    let store = match path {
        Some(path) => FileStore::new(path),
        None => FileStore::open_default().context("Failed to locate the default store")?,
    };
    Ok(Arc::new(store))
}

fn webhook_manager(store: Arc<dyn KeyValueStore>) -> anyhow::Result<WebhookManager> {
    WebhookManager::new(store, ovex_core::WebhookConfig::default().timeout).context("Failed to build the HTTP client")
}

async fn read_snapshot(args: &SnapshotArgs, verbose: bool) -> anyhow::Result<(String, Option<Url>)> {
    if verbose {
        print_step(1, 3, &format!("Loading {}", args.input.bright_white()));
    }

    let config = FetchConfig {
        timeout: Duration::from_secs(args.timeout),
        user_agent: args.user_agent.clone().unwrap_or_else(|| FetchConfig::default().user_agent),
    };
    let snapshot = load_snapshot(&args.input, &config)
        .await
        .with_context(|| format!("Failed to load snapshot: {}", args.input))?;

    let page_url = match &args.page_url {
        Some(url) => Some(Url::parse(url).with_context(|| format!("Invalid page URL: {}", url))?),
        None => snapshot.url,
    };

    debug!(
        input = %args.input,
        bytes = snapshot.html.len(),
        page_url = ?page_url.as_ref().map(Url::as_str),
        "snapshot loaded"
    );

    if verbose {
        eprintln!("  {} {}\n", "Size:".dimmed(), format_size(snapshot.html.len()).bright_white());
    }
    Ok((snapshot.html, page_url))
}

fn find_container(html: &str) -> anyhow::Result<Container> {
    let doc = Document::parse(html);
    Container::find(&doc)
        .context("Failed to search the snapshot")?
        .ok_or_else(|| anyhow!("No AI overview container in the snapshot"))
}

async fn run_extract(args: ExtractArgs, store: Option<PathBuf>, verbose: bool) -> anyhow::Result<()> {
    let (html, page_url) = read_snapshot(&args.snapshot, verbose).await?;

    if verbose {
        print_step(2, 3, "Extracting overview");
    }
    let container = find_container(&html)?;
    let extraction =
        Extraction::from_container(&container, page_url.as_ref()).context("Failed to extract the overview")?;
    info!(sources = extraction.sources.len(), query = ?extraction.search_query, "overview extracted");

    if verbose {
        print_extraction_details(&extraction.sources, extraction.search_query.as_deref(), extraction.html_content.len());
        print_step(3, 3, "Writing output");
    }

    let output = match args.format {
        OutputFormat::Markdown => extraction.markdown.clone(),
        OutputFormat::Html => extraction.html_content.clone(),
        OutputFormat::Json => extraction_to_json(&extraction, &JsonConfig::default()).context("Failed to render JSON")?,
    };

    match &args.output {
        Some(path) => {
            fs::write(path, &output).with_context(|| format!("Failed to write to file: {}", path.display()))?;
            print_success(&format!("Output written to {}", path.display().bright_white()));
        }
        None => print!("{}", output),
    }

    if let Some(dir) = &args.download {
        let path = download_markdown(&extraction.markdown, dir).context("Failed to save Markdown")?;
        print_success(&format!("Markdown saved to {}", path.display().bright_white()));
    }

    if args.send {
        let webhook = webhook_manager(open_store(store)?)?;
        if !webhook.is_configured() {
            bail!("Webhook is not configured. Run `ovex webhook set <URL>` first.");
        }

        let data = WebhookData::from_extraction(extraction, page_url.as_ref());
        let result = webhook.send_to_webhook(&data).await;
        if result.success {
            print_success("Sent to webhook successfully!");
        } else {
            warn!(error = ?result.error, "webhook delivery failed");
            bail!("Webhook failed: {}", result.error.unwrap_or_default());
        }
    }

    Ok(())
}

async fn run_automate(args: AutomateArgs, store: Option<PathBuf>, verbose: bool) -> anyhow::Result<()> {
    let (html, page_url) = read_snapshot(&args.snapshot, verbose).await?;
    let container = find_container(&html)?;
    debug!(ordinal = container.locator.ordinal, "container found");

    let mut page = HtmlPage::new(html);
    if let Some(url) = page_url {
        page = page.with_url(url);
    }

    let config = AutomationConfig::builder()
        .stage_timeout(Duration::from_secs(args.stage_timeout))
        .build();
    let orchestrator = Orchestrator::new(page.into_shared(), open_store(store)?, Arc::new(TerminalPresenter), config)
        .context("Failed to set up automation")?;

    if verbose {
        print_step(2, 3, "Running automation");
    }
    let state = orchestrator.process_container(&container).await;

    if verbose {
        print_step(3, 3, "Reporting");
    }
    if args.json {
        println!("{}", serde_json::to_string_pretty(&orchestrator.status())?);
    } else {
        println!("{}", state);
        print_breakers(&orchestrator.breaker_metrics());
    }
    Ok(())
}

fn read_input(input: &str) -> anyhow::Result<String> {
    if input == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer).context("Failed to read from stdin")?;
        Ok(buffer)
    } else {
        fs::read_to_string(input).with_context(|| format!("Failed to read file: {}", input))
    }
}

fn run_settings(command: SettingsCommand, store: Option<PathBuf>) -> anyhow::Result<()> {
    let settings = SettingsManager::new(open_store(store)?);

    match command {
        SettingsCommand::Show => println!("{}", settings.export_settings()?),
        SettingsCommand::Set { key, value } => {
            let value: serde_json::Value =
                serde_json::from_str(&value).unwrap_or_else(|_| serde_json::Value::String(value));
            settings.save_setting(&key, value).with_context(|| format!("Failed to save {}", key))?;
            print_success(&format!("{} updated", key));
        }
        SettingsCommand::Reset => {
            settings.reset_to_defaults()?;
            print_success("Settings reset to defaults");
        }
        SettingsCommand::Clear => {
            settings.clear_settings()?;
            print_success("Settings cleared");
        }
        SettingsCommand::Export { output } => {
            let json = settings.export_settings()?;
            match output {
                Some(path) => {
                    fs::write(&path, json).with_context(|| format!("Failed to write to file: {}", path.display()))?;
                    print_success(&format!("Settings exported to {}", path.display().bright_white()));
                }
                None => println!("{}", json),
            }
        }
        SettingsCommand::Import { input } => {
            settings.import_settings(&read_input(&input)?).context("Failed to import settings")?;
            print_success("Settings imported");
        }
    }
    Ok(())
}

async fn run_webhook(command: WebhookCommand, store: Option<PathBuf>) -> anyhow::Result<()> {
    let webhook = webhook_manager(open_store(store)?)?;

    match command {
        WebhookCommand::Show => match webhook.get_webhook_url() {
            Some(url) => println!("{}", url),
            None => print_info("Webhook is not configured"),
        },
        WebhookCommand::Set { url } => {
            webhook.save_webhook_url(&url)?;
            print_success("Webhook URL saved");
        }
        WebhookCommand::Remove => {
            webhook.remove_webhook_url()?;
            print_success("Webhook URL removed");
        }
        WebhookCommand::Test { url } => {
            let url = url
                .or_else(|| webhook.get_webhook_url())
                .ok_or_else(|| anyhow!("Webhook is not configured. Pass a URL or run `ovex webhook set <URL>`."))?;
            let result = webhook.test_webhook(&url).await;
            if result.success {
                print_success("Webhook test successful!");
            } else {
                bail!("Webhook test failed: {}", result.error.unwrap_or_default());
            }
        }
    }
    Ok(())
}

fn run_message(json: &str, store: Option<PathBuf>) -> anyhow::Result<()> {
    let message: Message = serde_json::from_str(json).context("Unrecognised message")?;
    let page = HtmlPage::new(String::new()).into_shared();
    let orchestrator = Orchestrator::new(page, open_store(store)?, Arc::new(TerminalPresenter), AutomationConfig::default())
        .context("Failed to set up the page context")?;

    let ack = orchestrator.handle_message(&message);
    println!("{}", serde_json::to_string(&ack)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if cli.verbose {
        print_banner();
        print_info("Debug logging enabled");
        eprintln!();
    }

    let result = match cli.command {
        Command::Extract(args) => run_extract(args, cli.store, cli.verbose).await,
        Command::Automate(args) => run_automate(args, cli.store, cli.verbose).await,
        Command::Settings(command) => run_settings(command, cli.store),
        Command::Webhook(command) => run_webhook(command, cli.store).await,
        Command::Message { json } => run_message(&json, cli.store),
        Command::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "ovex", &mut io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
    Ok(())
}
