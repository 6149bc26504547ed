//! Automatic expansion of the collapsed parts of the overview panel.
//!
//! Both expanders report an [`ExpandOutcome`] rather than a boolean so that
//! "nothing to do", "done" and "could not do it" stay distinguishable.

mod overviews;
mod sources;
pub mod strategies;

use std::fmt;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::debug;

use crate::circuit_breaker::Outcome;

pub use overviews::OverviewExpander;
pub use sources::SourcesExpander;
pub use strategies::{EXPAND_CONTROL_STRATEGIES, Strategy, find_expand_control};

/// Result of one expansion attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpandOutcome {
    /// The setting is off; nothing was attempted.
    Disabled,
    /// The panel was already open; nothing was clicked.
    AlreadyExpanded,
    /// A control was activated and the panel was seen opening.
    Expanded,
    /// No control to activate was found.
    NotFound,
    /// A control was activated but no effect was observed in time.
    Unconfirmed,
}

impl Outcome for ExpandOutcome {
    fn is_success(&self) -> bool {
        matches!(self, ExpandOutcome::AlreadyExpanded | ExpandOutcome::Expanded)
    }
}

impl fmt::Display for ExpandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExpandOutcome::Disabled => "disabled",
            ExpandOutcome::AlreadyExpanded => "already expanded",
            ExpandOutcome::Expanded => "expanded",
            ExpandOutcome::NotFound => "not found",
            ExpandOutcome::Unconfirmed => "unconfirmed",
        };
        f.write_str(name)
    }
}

pub type ExpansionCallback = Arc<dyn Fn() + Send + Sync>;

/// Callbacks fired after a confirmed expansion.
#[derive(Default)]
pub(crate) struct CompletionCallbacks {
    callbacks: Mutex<Vec<ExpansionCallback>>,
}

impl CompletionCallbacks {
    pub(crate) fn push(&self, callback: ExpansionCallback) {
        self.callbacks.lock().unwrap_or_else(|e| e.into_inner()).push(callback);
    }

    pub(crate) fn fire(&self, module: &str) {
        let callbacks = self.callbacks.lock().unwrap_or_else(|e| e.into_inner()).clone();
        debug!(module, count = callbacks.len(), "expansion callbacks");
        for callback in callbacks {
            callback();
        }
    }
}
