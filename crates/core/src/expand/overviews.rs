use std::sync::Arc;

use tracing::{debug, info};

use super::{CompletionCallbacks, ExpandOutcome};
use crate::Result;
use crate::config::OverviewConfig;
use crate::page::{ClickMethod, Page, page_has, with_snapshot};
use crate::selectors::{COLLAPSED_TOGGLE, CONTAINER, EXPANDED_TOGGLE};
use crate::settings::SettingsManager;

/// Opens a collapsed overview panel.
pub struct OverviewExpander {
    page: Arc<dyn Page>,
    settings: Arc<SettingsManager>,
    config: OverviewConfig,
    callbacks: CompletionCallbacks,
}

impl OverviewExpander {
    pub fn new(page: Arc<dyn Page>, settings: Arc<SettingsManager>, config: OverviewConfig) -> Self {
        Self { page, settings, config, callbacks: CompletionCallbacks::default() }
    }

    /// Registers a callback fired after a confirmed expansion.
    pub fn on_expansion_complete(&self, callback: impl Fn() + Send + Sync + 'static) {
        self.callbacks.push(Arc::new(callback));
    }

    /// Clicks the collapsed toggle, if any, and waits for the panel to open.
    pub async fn expand_ai_overview(&self) -> Result<ExpandOutcome> {
        if !self.settings.get_settings().auto_expand_overviews {
            debug!("auto-expand of overviews is disabled");
            return Ok(ExpandOutcome::Disabled);
        }

        let toggle = with_snapshot(self.page.as_ref(), |doc| {
            Ok(doc.select_first(COLLAPSED_TOGGLE)?.map(|el| el.locator()))
        })?;

        let Some(toggle) = toggle else {
            if self.is_expanded()? {
                debug!("overview already expanded");
                return Ok(ExpandOutcome::AlreadyExpanded);
            }
            debug!("no collapsed overview found");
            return Ok(ExpandOutcome::NotFound);
        };

        info!("collapsed overview found, expanding");
        self.page.dispatch(toggle, ClickMethod::Direct)?;

        if self.wait_for_expansion().await? {
            info!("overview expanded");
            self.callbacks.fire("overview");
            Ok(ExpandOutcome::Expanded)
        } else {
            Ok(ExpandOutcome::Unconfirmed)
        }
    }

    async fn wait_for_expansion(&self) -> Result<bool> {
        tokio::time::sleep(self.config.initial_delay).await;

        for poll in 1..=self.config.max_polls {
            if self.is_expanded()? {
                debug!(poll, "expansion confirmed");
                return Ok(true);
            }
            if poll < self.config.max_polls {
                tokio::time::sleep(self.config.poll_interval).await;
            }
        }

        debug!(polls = self.config.max_polls, "expansion not confirmed");
        Ok(false)
    }

    pub fn is_expanded(&self) -> Result<bool> {
        page_has(self.page.as_ref(), EXPANDED_TOGGLE)
    }

    /// Whether the overview container is on the page at all.
    pub fn is_present(&self) -> Result<bool> {
        page_has(self.page.as_ref(), CONTAINER)
    }
}
