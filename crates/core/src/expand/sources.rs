use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use super::strategies::find_expand_control;
use super::{CompletionCallbacks, ExpandOutcome};
use crate::Result;
use crate::config::SourcesConfig;
use crate::page::{ClickMethod, ElementLocator, Page, page_has, with_snapshot};
use crate::readiness::Readiness;
use crate::selectors::{MOST_SHARED_CONTENT, SOURCES_EXPANDED_MARKER};
use crate::settings::SettingsManager;

/// A located control, detached from the snapshot it was found in.
struct Control {
    strategy: &'static str,
    locator: ElementLocator,
    accepts_trigger: bool,
}

/// Opens the sources sub-panel once the overview stage signals readiness.
///
/// The control is activated at most once per instance: a second activation
/// collapses the panel again on the host page.
pub struct SourcesExpander {
    page: Arc<dyn Page>,
    settings: Arc<SettingsManager>,
    config: SourcesConfig,
    ready: Readiness,
    clicked: AtomicBool,
    callbacks: CompletionCallbacks,
}

impl SourcesExpander {
    pub fn new(page: Arc<dyn Page>, settings: Arc<SettingsManager>, config: SourcesConfig) -> Self {
        Self {
            page,
            settings,
            config,
            ready: Readiness::new("sources"),
            clicked: AtomicBool::new(false),
            callbacks: CompletionCallbacks::default(),
        }
    }

    pub fn on_expansion_complete(&self, callback: impl Fn() + Send + Sync + 'static) {
        self.callbacks.push(Arc::new(callback));
    }

    /// Unblocks [`expand_sources`](Self::expand_sources).
    pub fn set_ready(&self) {
        self.ready.signal();
    }

    pub fn is_ready(&self) -> bool {
        self.ready.is_ready()
    }

    /// Clears the readiness signal and the click guard.
    pub fn reset(&self) {
        self.ready.reset();
        self.clicked.store(false, Ordering::SeqCst);
    }

    /// Whether the control has been activated by this instance.
    pub fn has_clicked(&self) -> bool {
        self.clicked.load(Ordering::SeqCst)
    }

    pub async fn expand_sources(&self) -> Result<ExpandOutcome> {
        if !self.settings.get_settings().auto_expand_sources {
            debug!("auto-expand of sources is disabled");
            return Ok(ExpandOutcome::Disabled);
        }

        if !self.ready.is_ready() {
            debug!("waiting for the overview stage");
        }
        self.ready.wait(self.config.readiness_timeout).await?;

        tokio::time::sleep(self.config.settle_delay).await;

        if self.are_sources_expanded()? {
            debug!("sources already expanded");
            return Ok(ExpandOutcome::AlreadyExpanded);
        }

        let outcome = self.expand_with_attempts().await?;
        if outcome == ExpandOutcome::Expanded {
            info!("sources expanded");
            self.callbacks.fire("sources");
        }
        Ok(outcome)
    }

    async fn expand_with_attempts(&self) -> Result<ExpandOutcome> {
        let attempts = self.config.max_attempts;

        for attempt in 1..=attempts {
            debug!(attempt, attempts, "locating sources control");

            if self.are_sources_expanded()? {
                return Ok(if self.has_clicked() { ExpandOutcome::Expanded } else { ExpandOutcome::AlreadyExpanded });
            }

            match self.locate_control()? {
                None => debug!(attempt, "no expand control found"),
                Some(_) if self.has_clicked() => debug!(attempt, "control already activated, waiting for effect"),
                Some(control) => {
                    debug!(strategy = control.strategy, ordinal = control.locator.ordinal, "expand control found");
                    if self.activate(&control).await.is_some() {
                        self.clicked.store(true, Ordering::SeqCst);
                        tokio::time::sleep(self.config.verify_delay).await;
                        if self.are_sources_expanded()? {
                            return Ok(ExpandOutcome::Expanded);
                        }
                        debug!("click had no visible effect yet");
                    }
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.config.attempt_interval).await;
            }
        }

        if self.has_clicked() {
            warn!(attempts, "sources control activated but expansion not confirmed");
            Ok(ExpandOutcome::Unconfirmed)
        } else {
            warn!(attempts, "no sources control found");
            Ok(ExpandOutcome::NotFound)
        }
    }

    fn locate_control(&self) -> Result<Option<Control>> {
        with_snapshot(self.page.as_ref(), |doc| {
            Ok(find_expand_control(doc).map(|(strategy, element)| Control {
                strategy,
                locator: element.locator(),
                accepts_trigger: element.attr("jsaction").is_some_and(|action| action.contains("trigger")),
            }))
        })
    }

    /// Tries each dispatch method until one is delivered without error.
    ///
    /// Delivery is not proof of effect; callers still verify the marker.
    async fn activate(&self, control: &Control) -> Option<ClickMethod> {
        for method in ClickMethod::ALL {
            if method == ClickMethod::Trigger && !control.accepts_trigger {
                continue;
            }

            match self.page.dispatch(control.locator, method) {
                Ok(()) => {
                    debug!(%method, "activation delivered");
                    tokio::time::sleep(self.config.click_settle).await;
                    return Some(method);
                }
                Err(e) => debug!(%method, error = %e, "activation failed"),
            }
        }

        warn!(strategy = control.strategy, "every activation method failed");
        None
    }

    pub fn are_sources_expanded(&self) -> Result<bool> {
        page_has(self.page.as_ref(), SOURCES_EXPANDED_MARKER)
    }

    /// Whether the page has a sources block at all.
    pub fn are_sources_present(&self) -> Result<bool> {
        page_has(self.page.as_ref(), MOST_SHARED_CONTENT)
    }
}
