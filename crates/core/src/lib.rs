pub mod auto_webhook;
pub mod circuit_breaker;
pub mod config;
pub mod detection;
pub mod error;
pub mod expand;
pub mod extract;
pub mod fetch;
pub mod formatters;
pub mod message;
pub mod orchestrator;
pub mod page;
pub mod parse;
pub mod presenter;
pub mod readiness;
pub mod selectors;
pub mod settings;
pub mod state_machine;
pub mod storage;
pub mod webhook;

pub use auto_webhook::{AutoWebhook, DeliveryOutcome};
pub use circuit_breaker::{BreakerMetrics, BreakerState, CircuitBreaker, Outcome};
pub use config::{
    AutomationConfig, AutomationConfigBuilder, BreakerConfig, DetectionConfig, OverviewConfig, SourcesConfig,
    WebhookConfig,
};
pub use detection::{ContainerDetector, DetectionStatus};
pub use error::{OvexError, Result};
pub use expand::{ExpandOutcome, OverviewExpander, SourcesExpander};
pub use extract::{Container, Extraction, Source, clean_redirect_url, extract_content, extract_search_query, extract_sources};
pub use fetch::{FetchConfig, Snapshot, fetch_file, fetch_stdin, fetch_url, load_snapshot};
pub use formatters::{JsonConfig, create_markdown, download_markdown, extraction_to_json};
pub use message::{Ack, Message};
pub use orchestrator::{AutomationStatus, Orchestrator};
pub use page::{ClickMethod, ElementLocator, HtmlPage, Page, PageEvent};
pub use parse::Document;
pub use presenter::{LogPresenter, Notification, NotificationKind, Presenter, RecordingPresenter};
pub use readiness::Readiness;
pub use settings::{Settings, SettingsManager};
pub use state_machine::{AutomationAction, AutomationState, StateChange, StateMachine};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use webhook::{WebhookData, WebhookManager, WebhookPayload, WebhookResult, is_valid_webhook_url};
