//! The orchestration state machine.
//!
//! An explicit table of allowed actions per state and a map from action to
//! the next state. A rejected action leaves state and data untouched.

use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AutomationState {
    Idle,
    ExpandingOverview,
    ExpandingSources,
    SendingWebhook,
    Completed,
    Failed,
    ManualMode,
    Retrying,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AutomationAction {
    StartAutomation,
    OverviewComplete,
    OverviewFailed,
    OverviewSkipped,
    SourcesComplete,
    SourcesFailed,
    SourcesSkipped,
    WebhookComplete,
    WebhookFailed,
    WebhookSkipped,
    Retry,
    FallbackToManual,
    ManualMode,
    Reset,
}

impl AutomationState {
    /// Actions accepted in this state.
    pub fn allowed_actions(self) -> &'static [AutomationAction] {
        use AutomationAction::*;
        match self {
            AutomationState::Idle => &[StartAutomation, ManualMode],
            AutomationState::ExpandingOverview => &[OverviewComplete, OverviewFailed, OverviewSkipped],
            AutomationState::ExpandingSources => &[SourcesComplete, SourcesFailed, SourcesSkipped],
            AutomationState::SendingWebhook => &[WebhookComplete, WebhookFailed, WebhookSkipped],
            AutomationState::Completed => &[Reset],
            AutomationState::Failed => &[Retry, FallbackToManual, Reset],
            AutomationState::ManualMode => &[Reset],
            AutomationState::Retrying => &[StartAutomation, FallbackToManual],
        }
    }
}

impl AutomationAction {
    /// State reached by taking this action.
    pub fn next_state(self) -> AutomationState {
        use AutomationAction::*;
        match self {
            StartAutomation => AutomationState::ExpandingOverview,
            OverviewComplete | OverviewSkipped => AutomationState::ExpandingSources,
            SourcesComplete | SourcesSkipped => AutomationState::SendingWebhook,
            WebhookComplete | WebhookSkipped => AutomationState::Completed,
            OverviewFailed | SourcesFailed | WebhookFailed => AutomationState::Failed,
            Retry => AutomationState::Retrying,
            FallbackToManual | ManualMode => AutomationState::ManualMode,
            Reset => AutomationState::Idle,
        }
    }
}

impl fmt::Display for AutomationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AutomationState::Idle => "IDLE",
            AutomationState::ExpandingOverview => "EXPANDING_OVERVIEW",
            AutomationState::ExpandingSources => "EXPANDING_SOURCES",
            AutomationState::SendingWebhook => "SENDING_WEBHOOK",
            AutomationState::Completed => "COMPLETED",
            AutomationState::Failed => "FAILED",
            AutomationState::ManualMode => "MANUAL_MODE",
            AutomationState::Retrying => "RETRYING",
        };
        f.write_str(name)
    }
}

impl fmt::Display for AutomationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Serialization already yields the wire name.
        match serde_json::to_value(self) {
            Ok(Value::String(name)) => f.write_str(&name),
            _ => write!(f, "{:?}", self),
        }
    }
}

/// A state change as seen by listeners.
#[derive(Debug, Clone)]
pub struct StateChange {
    pub state: AutomationState,
    pub previous: AutomationState,
    pub action: AutomationAction,
    pub data: Option<Map<String, Value>>,
}

/// The most recent transition and the accumulated data.
#[derive(Debug, Clone, Serialize)]
pub struct LastTransition {
    pub from: Option<AutomationState>,
    pub to: AutomationState,
    pub data: Map<String, Value>,
}

pub type StateListener = Arc<dyn Fn(&StateChange) + Send + Sync>;

#[derive(Debug)]
struct Inner {
    state: AutomationState,
    previous: Option<AutomationState>,
    data: Map<String, Value>,
}

pub struct StateMachine {
    inner: Mutex<Inner>,
    listeners: Mutex<Vec<StateListener>>,
}

impl StateMachine {
    pub fn new() -> Self {
        debug!(state = %AutomationState::Idle, "state machine initialised");
        Self {
            inner: Mutex::new(Inner { state: AutomationState::Idle, previous: None, data: Map::new() }),
            listeners: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Registers a listener called synchronously after every change.
    pub fn on_state_change(&self, listener: impl Fn(&StateChange) + Send + Sync + 'static) {
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Arc::new(listener));
    }

    fn notify(&self, change: &StateChange) {
        let listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner()).clone();
        for listener in listeners {
            listener(change);
        }
    }

    /// Applies `action`, merging `data` into the state data.
    ///
    /// Returns `false` without changing anything when the action is not
    /// allowed in the current state.
    pub fn transition(&self, action: AutomationAction, data: Option<Map<String, Value>>) -> bool {
        let change = {
            let mut inner = self.lock();
            if !inner.state.allowed_actions().contains(&action) {
                warn!(state = %inner.state, %action, "invalid transition");
                return false;
            }

            let previous = inner.state;
            inner.previous = Some(previous);
            inner.state = action.next_state();
            if let Some(data) = &data {
                inner.data.extend(data.clone());
            }

            info!(from = %previous, to = %inner.state, %action, "transition");
            StateChange { state: inner.state, previous, action, data }
        };

        self.notify(&change);
        true
    }

    pub fn can_execute(&self, action: AutomationAction) -> bool {
        self.lock().state.allowed_actions().contains(&action)
    }

    /// Returns to `Idle` from any state, clearing the data.
    pub fn reset(&self) {
        let change = {
            let mut inner = self.lock();
            let previous = inner.state;
            *inner = Inner { state: AutomationState::Idle, previous: None, data: Map::new() };
            info!(from = %previous, "state machine reset");
            StateChange { state: AutomationState::Idle, previous, action: AutomationAction::Reset, data: None }
        };

        self.notify(&change);
    }

    pub fn state(&self) -> AutomationState {
        self.lock().state
    }

    pub fn is_automation_active(&self) -> bool {
        matches!(
            self.state(),
            AutomationState::ExpandingOverview | AutomationState::ExpandingSources | AutomationState::SendingWebhook
        )
    }

    pub fn is_completed(&self) -> bool {
        self.state() == AutomationState::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.state() == AutomationState::Failed
    }

    pub fn is_manual_mode(&self) -> bool {
        self.state() == AutomationState::ManualMode
    }

    pub fn state_data(&self) -> Map<String, Value> {
        self.lock().data.clone()
    }

    pub fn update_state_data(&self, data: Map<String, Value>) {
        self.lock().data.extend(data);
    }

    pub fn last_transition(&self) -> LastTransition {
        let inner = self.lock();
        LastTransition { from: inner.previous, to: inner.state, data: inner.data.clone() }
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
