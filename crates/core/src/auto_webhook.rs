//! Automatic delivery once both expansion stages are done.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::circuit_breaker::Outcome;
use crate::config::WebhookConfig;
use crate::extract::{Container, Extraction};
use crate::page::Page;
use crate::presenter::{Notification, Presenter};
use crate::readiness::Readiness;
use crate::settings::SettingsManager;
use crate::webhook::{WebhookData, WebhookManager};
use crate::{OvexError, Result};

/// Result of one automatic delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    /// The setting is off.
    Disabled,
    /// No valid webhook URL is stored.
    NotConfigured,
    Delivered,
    /// The request was made and failed; holds the reason.
    Failed(String),
}

impl Outcome for DeliveryOutcome {
    fn is_success(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered)
    }
}

pub struct AutoWebhook {
    page: Arc<dyn Page>,
    settings: Arc<SettingsManager>,
    webhook: Arc<WebhookManager>,
    presenter: Arc<dyn Presenter>,
    config: WebhookConfig,
    ready: Readiness,
}

impl AutoWebhook {
    pub fn new(
        page: Arc<dyn Page>, settings: Arc<SettingsManager>, webhook: Arc<WebhookManager>,
        presenter: Arc<dyn Presenter>, config: WebhookConfig,
    ) -> Self {
        Self { page, settings, webhook, presenter, config, ready: Readiness::new("webhook") }
    }

    /// Unblocks [`auto_send_webhook`](Self::auto_send_webhook).
    pub fn set_ready(&self) {
        self.ready.signal();
    }

    pub fn is_ready(&self) -> bool {
        self.ready.is_ready()
    }

    pub fn reset(&self) {
        self.ready.reset();
    }

    /// Whether a call right now would attempt a delivery without waiting.
    pub fn is_ready_to_send(&self) -> bool {
        self.settings.get_settings().auto_send_webhook && self.webhook.is_configured() && self.ready.is_ready()
    }

    pub async fn auto_send_webhook(&self) -> Result<DeliveryOutcome> {
        if !self.settings.get_settings().auto_send_webhook {
            debug!("auto-send of webhook is disabled");
            return Ok(DeliveryOutcome::Disabled);
        }

        if !self.webhook.is_configured() {
            debug!("webhook not configured, skipping auto-send");
            return Ok(DeliveryOutcome::NotConfigured);
        }

        self.ready.wait(self.config.readiness_timeout).await?;
        tokio::time::sleep(self.config.settle_delay).await;

        let container = Container::capture(self.page.as_ref())?.ok_or(OvexError::ContainerNotFound)?;
        let data = self.prepare_webhook_data(&container)?;

        let result = self.webhook.send_to_webhook(&data).await;
        if result.success {
            info!("auto-webhook sent");
            self.presenter.notify(&Notification::success("Auto-webhook sent!"));
            Ok(DeliveryOutcome::Delivered)
        } else {
            let reason = result.error.unwrap_or_else(|| "unknown webhook error".to_string());
            self.presenter
                .notify(&Notification::error(format!("Auto-webhook failed: {}", reason)));
            Ok(DeliveryOutcome::Failed(reason))
        }
    }

    /// Extracts everything the payload carries from `container`.
    pub fn prepare_webhook_data(&self, container: &Container) -> Result<WebhookData> {
        let page_url = self.page.url();
        let extraction = Extraction::from_container(container, page_url.as_ref())?;
        Ok(WebhookData::from_extraction(extraction, page_url.as_ref()))
    }
}
