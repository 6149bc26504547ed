//! One automation pipeline per page context.
//!
//! The [`Orchestrator`] owns every collaborator: the expanders, the
//! auto-webhook, one circuit breaker per stage and the state machine. It is
//! built once from a page, a store, a presenter and an
//! [`AutomationConfig`](crate::AutomationConfig), and nothing is looked up
//! globally.
//!
//! For each detected container the stages run in order, each under its
//! breaker with retries and bounded by `stage_timeout`:
//!
//! ```text
//! IDLE → EXPANDING_OVERVIEW → EXPANDING_SOURCES → SENDING_WEBHOOK → COMPLETED
//!                 ↘                  ↘                   ↘
//!                  FAILED → MANUAL_MODE (manual extraction offered)
//! ```

use std::fmt::Debug;
use std::future::Future;
use std::sync::{Arc, Mutex, Weak};

use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{debug, error, info, warn};

use crate::auto_webhook::{AutoWebhook, DeliveryOutcome};
use crate::circuit_breaker::{BreakerMetrics, CircuitBreaker, Outcome};
use crate::config::AutomationConfig;
use crate::detection::{ContainerDetector, DetectionStatus};
use crate::expand::{ExpandOutcome, OverviewExpander, SourcesExpander};
use crate::extract::{Container, Extraction};
use crate::message::{Ack, Message};
use crate::page::Page;
use crate::presenter::{Notification, Presenter};
use crate::settings::SettingsManager;
use crate::state_machine::{AutomationAction, AutomationState, StateChange, StateMachine};
use crate::storage::KeyValueStore;
use crate::webhook::{WebhookData, WebhookManager, WebhookResult};
use crate::{OvexError, Result};

struct Breakers {
    overview: CircuitBreaker,
    sources: CircuitBreaker,
    webhook: CircuitBreaker,
}

pub struct Orchestrator {
    page: Arc<dyn Page>,
    settings: Arc<SettingsManager>,
    webhook: Arc<WebhookManager>,
    presenter: Arc<dyn Presenter>,
    config: AutomationConfig,
    machine: StateMachine,
    overview: OverviewExpander,
    sources: Arc<SourcesExpander>,
    auto_webhook: Arc<AutoWebhook>,
    breakers: Breakers,
    detector: Mutex<Option<ContainerDetector>>,
}

impl Orchestrator {
    pub fn new(
        page: Arc<dyn Page>, store: Arc<dyn KeyValueStore>, presenter: Arc<dyn Presenter>, config: AutomationConfig,
    ) -> Result<Self> {
        let settings = Arc::new(SettingsManager::new(store.clone()));
        let webhook = Arc::new(WebhookManager::new(store, config.webhook.timeout)?);

        let overview = OverviewExpander::new(page.clone(), settings.clone(), config.overview.clone());
        let sources = Arc::new(SourcesExpander::new(page.clone(), settings.clone(), config.sources.clone()));
        let auto_webhook = Arc::new(AutoWebhook::new(
            page.clone(),
            settings.clone(),
            webhook.clone(),
            presenter.clone(),
            config.webhook.clone(),
        ));

        let next = sources.clone();
        overview.on_expansion_complete(move || next.set_ready());
        let next = auto_webhook.clone();
        sources.on_expansion_complete(move || next.set_ready());

        let breakers = Breakers {
            overview: CircuitBreaker::new("AutoExpanderOverviews", config.breaker.clone()),
            sources: CircuitBreaker::new("AutoExpanderSources", config.breaker.clone()),
            webhook: CircuitBreaker::new("AutoWebhook", config.breaker.clone()),
        };

        let machine = StateMachine::new();
        machine.on_state_change(|change| {
            debug!(state = %change.state, previous = %change.previous, action = %change.action, "automation state");
        });

        Ok(Self {
            page,
            settings,
            webhook,
            presenter,
            config,
            machine,
            overview,
            sources,
            auto_webhook,
            breakers,
            detector: Mutex::new(None),
        })
    }

    pub fn settings(&self) -> &SettingsManager {
        &self.settings
    }

    pub fn webhook(&self) -> &WebhookManager {
        &self.webhook
    }

    pub fn on_state_change(&self, listener: impl Fn(&StateChange) + Send + Sync + 'static) {
        self.machine.on_state_change(listener);
    }

    fn detector(&self) -> std::sync::MutexGuard<'_, Option<ContainerDetector>> {
        self.detector.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Starts container detection and runs the pipeline on the first container found.
    pub fn start(self: &Arc<Self>) {
        let mut detector = self.detector();
        if detector.is_none() {
            let orchestrator: Weak<Self> = Arc::downgrade(self);
            *detector = Some(ContainerDetector::new(self.page.clone(), self.config.detection.clone(), move |container| {
                let orchestrator = orchestrator.clone();
                async move {
                    match orchestrator.upgrade() {
                        Some(orchestrator) => {
                            orchestrator.process_container(&container).await;
                            Ok(())
                        }
                        None => Err(OvexError::Callback("automation was shut down".to_string())),
                    }
                }
            }));
        }

        if let Some(detector) = detector.as_ref() {
            detector.start_detection();
        }
    }

    pub fn detection_status(&self) -> Option<DetectionStatus> {
        self.detector().as_ref().map(ContainerDetector::status)
    }

    /// Runs every stage for `container` and returns the state it ends in.
    pub async fn process_container(&self, container: &Container) -> AutomationState {
        let start = data(json!({ "ordinal": container.locator.ordinal }));
        if !self.machine.transition(AutomationAction::StartAutomation, start) {
            warn!(state = %self.machine.state(), "automation already ran for this page");
            return self.machine.state();
        }

        info!("automation started");
        let settings = self.settings.get_settings();

        let action = if settings.auto_expand_overviews {
            self.overview_stage().await
        } else {
            AutomationAction::OverviewSkipped
        };
        if !self.advance(action, container) {
            return self.machine.state();
        }
        self.sources.set_ready();

        let action = if settings.auto_expand_sources {
            self.sources_stage().await
        } else {
            AutomationAction::SourcesSkipped
        };
        if !self.advance(action, container) {
            return self.machine.state();
        }
        self.auto_webhook.set_ready();

        let action = if settings.auto_send_webhook && self.webhook.is_configured() {
            self.webhook_stage().await
        } else {
            AutomationAction::WebhookSkipped
        };
        self.advance(action, container);

        let state = self.machine.state();
        info!(%state, "automation finished");
        state
    }

    async fn overview_stage(&self) -> AutomationAction {
        let result = self
            .run_stage("overview", &self.breakers.overview, || self.overview.expand_ai_overview())
            .await;
        match result {
            Ok(ExpandOutcome::Expanded | ExpandOutcome::AlreadyExpanded) => AutomationAction::OverviewComplete,
            Ok(ExpandOutcome::NotFound | ExpandOutcome::Disabled) => AutomationAction::OverviewSkipped,
            Ok(ExpandOutcome::Unconfirmed) => {
                warn!(stage = "overview", "expansion not confirmed");
                AutomationAction::OverviewFailed
            }
            Err(e) => {
                error!(stage = "overview", error = %e, "stage failed");
                AutomationAction::OverviewFailed
            }
        }
    }

    async fn sources_stage(&self) -> AutomationAction {
        let result = self
            .run_stage("sources", &self.breakers.sources, || self.sources.expand_sources())
            .await;
        match result {
            Ok(ExpandOutcome::Expanded | ExpandOutcome::AlreadyExpanded) => AutomationAction::SourcesComplete,
            Ok(ExpandOutcome::Disabled) => AutomationAction::SourcesSkipped,
            Ok(outcome) => {
                warn!(stage = "sources", %outcome, "sources not expanded");
                AutomationAction::SourcesFailed
            }
            Err(e) => {
                error!(stage = "sources", error = %e, "stage failed");
                AutomationAction::SourcesFailed
            }
        }
    }

    async fn webhook_stage(&self) -> AutomationAction {
        let result = self
            .run_stage("webhook", &self.breakers.webhook, || self.auto_webhook.auto_send_webhook())
            .await;
        match result {
            Ok(DeliveryOutcome::Delivered) => AutomationAction::WebhookComplete,
            Ok(DeliveryOutcome::Disabled | DeliveryOutcome::NotConfigured) => AutomationAction::WebhookSkipped,
            Ok(DeliveryOutcome::Failed(reason)) => {
                warn!(stage = "webhook", reason = %reason, "delivery failed");
                AutomationAction::WebhookFailed
            }
            Err(e) => {
                error!(stage = "webhook", error = %e, "stage failed");
                AutomationAction::WebhookFailed
            }
        }
    }

    /// Runs one stage under its breaker, with retries, bounded by `stage_timeout`.
    async fn run_stage<T, F, Fut>(&self, stage: &'static str, breaker: &CircuitBreaker, operation: F) -> Result<T>
    where
        T: Outcome + Debug,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let timeout = self.config.stage_timeout;
        let attempt = breaker.execute_with_retry(stage, self.config.step_retries, operation);

        match tokio::time::timeout(timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(OvexError::StageTimeout { stage: stage.to_string(), timeout_ms: timeout.as_millis() as u64 }),
        }
    }

    /// Applies a stage result; on failure falls back to manual mode.
    ///
    /// Returns whether the pipeline should continue.
    fn advance(&self, action: AutomationAction, container: &Container) -> bool {
        self.machine.transition(action, None);
        if self.machine.state() != AutomationState::Failed {
            return true;
        }

        warn!(%action, "automation failed, falling back to manual extraction");
        self.machine.transition(AutomationAction::FallbackToManual, None);
        self.presenter.offer_manual_extraction(container);
        false
    }

    /// Extracts the overview currently on the page.
    pub fn extract(&self) -> Result<Extraction> {
        let container = Container::capture(self.page.as_ref())?.ok_or(OvexError::ContainerNotFound)?;
        let page_url = self.page.url();
        let extraction = Extraction::from_container(&container, page_url.as_ref())?;
        info!(sources = extraction.sources.len(), "overview extracted");
        Ok(extraction)
    }

    /// Sends a manual extraction to the stored webhook and notifies the user.
    pub async fn send_extraction(&self, extraction: &Extraction) -> WebhookResult {
        if !self.webhook.is_configured() {
            let result = WebhookResult::failed(OvexError::WebhookNotConfigured.to_string());
            self.presenter.notify(&Notification::error("Please configure webhook URL in extension settings"));
            return result;
        }

        let page_url = self.page.url();
        let data = WebhookData::from_extraction(extraction.clone(), page_url.as_ref());
        let result = self.webhook.send_to_webhook(&data).await;

        let notification = if result.success {
            Notification::success("Sent to webhook successfully!")
        } else {
            Notification::error(format!("Webhook failed: {}", result.error.as_deref().unwrap_or("unknown error")))
        };
        self.presenter.notify(&notification);
        result
    }

    /// Handles a message from the settings surface. Every message reloads the settings.
    pub fn handle_message(&self, message: &Message) -> Ack {
        match message {
            Message::SettingChanged { key, value } => info!(key = %key, value = %value, "setting changed"),
            Message::SettingsReset => info!("settings reset"),
        }
        let settings = self.settings.get_settings();
        debug!(?settings, "settings reloaded");
        Ack::ok()
    }

    /// Returns to idle: state machine, breakers, readiness signals, guards and detection.
    pub fn reset(&self) {
        self.machine.reset();
        self.breakers.overview.reset();
        self.breakers.sources.reset();
        self.breakers.webhook.reset();
        self.sources.reset();
        self.auto_webhook.reset();

        if let Some(detector) = self.detector().as_ref() {
            detector.force_restart();
        }
        info!("automation reset");
    }

    pub fn breaker_metrics(&self) -> Vec<BreakerMetrics> {
        vec![self.breakers.overview.metrics(), self.breakers.sources.metrics(), self.breakers.webhook.metrics()]
    }

    pub fn state(&self) -> AutomationState {
        self.machine.state()
    }

    pub fn state_data(&self) -> Map<String, Value> {
        self.machine.state_data()
    }

    pub fn status(&self) -> AutomationStatus {
        AutomationStatus {
            state: self.state(),
            breakers: self.breaker_metrics(),
            detection: self.detection_status(),
        }
    }
}

/// Snapshot of a running orchestrator.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationStatus {
    pub state: AutomationState,
    pub breakers: Vec<BreakerMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection: Option<DetectionStatus>,
}

fn data(value: Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}
