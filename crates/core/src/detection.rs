//! Watching the page for the overview container.
//!
//! Detection runs as a single task that arms four triggers at once: an
//! immediate check, a debounced reaction to structural mutations, a longer
//! debounced reaction to scrolling and a periodic poll. The first trigger to
//! see the container claims the processing lock, the watch is torn down and
//! the container is handed to the callback. A failing callback releases the
//! lock and detection restarts after `retry_delay`.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at, sleep_until};
use tracing::{debug, error, info, warn};

use crate::Result;
use crate::config::DetectionConfig;
use crate::extract::Container;
use crate::page::{Page, PageEvent};

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Receives each detected container.
pub type ContainerCallback = Arc<dyn Fn(Container) -> BoxFuture<Result<()>> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionStatus {
    pub is_processing: bool,
    pub has_processed: bool,
    pub is_detection_active: bool,
}

struct Shared {
    page: Arc<dyn Page>,
    config: DetectionConfig,
    callback: ContainerCallback,
    processing: AtomicBool,
    processed: AtomicBool,
    watching: AtomicBool,
}

pub struct ContainerDetector {
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ContainerDetector {
    pub fn new<F, Fut>(page: Arc<dyn Page>, config: DetectionConfig, handler: F) -> Self
    where
        F: Fn(Container) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let callback: ContainerCallback =
            Arc::new(move |container| -> BoxFuture<Result<()>> { Box::pin(handler(container)) });
        Self {
            shared: Arc::new(Shared {
                page,
                config,
                callback,
                processing: AtomicBool::new(false),
                processed: AtomicBool::new(false),
                watching: AtomicBool::new(false),
            }),
            task: Mutex::new(None),
        }
    }

    fn task(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Starts watching, unless a container was already processed or a watch is running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_detection(&self) {
        if self.shared.processed.load(Ordering::SeqCst) {
            debug!("container already processed, not starting detection");
            return;
        }

        let mut task = self.task();
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            debug!("detection already running");
            return;
        }

        info!("starting container detection");
        *task = Some(tokio::spawn(self.shared.clone().run(None)));
    }

    /// Checks for the container right now and hands it off if found.
    ///
    /// Returns whether the container is present.
    pub fn force_check(&self) -> Result<bool> {
        let Some(container) = Container::capture(self.shared.page.as_ref())? else {
            return Ok(false);
        };

        if self.shared.claim() {
            debug!("forced check found the container");
            let mut task = self.task();
            if let Some(running) = task.take() {
                running.abort();
            }
            self.shared.watching.store(false, Ordering::SeqCst);
            *task = Some(tokio::spawn(self.shared.clone().run(Some(container))));
        }
        Ok(true)
    }

    /// Stops detection and clears every flag.
    pub fn reset(&self) {
        if let Some(running) = self.task().take() {
            running.abort();
        }
        self.shared.processing.store(false, Ordering::SeqCst);
        self.shared.processed.store(false, Ordering::SeqCst);
        self.shared.watching.store(false, Ordering::SeqCst);
        debug!("detection reset");
    }

    pub fn force_restart(&self) {
        self.reset();
        self.start_detection();
    }

    pub fn status(&self) -> DetectionStatus {
        DetectionStatus {
            is_processing: self.shared.processing.load(Ordering::SeqCst),
            has_processed: self.shared.processed.load(Ordering::SeqCst),
            is_detection_active: self.is_detection_active(),
        }
    }

    pub fn is_container_present(&self) -> Result<bool> {
        Ok(Container::capture(self.shared.page.as_ref())?.is_some())
    }

    /// Whether the triggers are currently armed.
    pub fn is_detection_active(&self) -> bool {
        self.shared.watching.load(Ordering::SeqCst)
    }
}

impl Drop for ContainerDetector {
    fn drop(&mut self) {
        if let Some(running) = self.task().take() {
            running.abort();
        }
    }
}

impl Shared {
    fn claim(&self) -> bool {
        !self.processed.load(Ordering::SeqCst)
            && self.processing.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_ok()
    }

    async fn run(self: Arc<Self>, mut found: Option<Container>) {
        loop {
            let container = match found.take() {
                Some(container) => container,
                None => self.watch().await,
            };

            info!(ordinal = container.locator.ordinal, "container found, handing off");
            match (self.callback)(container).await {
                Ok(()) => {
                    self.processed.store(true, Ordering::SeqCst);
                    self.processing.store(false, Ordering::SeqCst);
                    debug!("container processed");
                    return;
                }
                Err(e) => {
                    error!(error = %e, retry_ms = self.config.retry_delay.as_millis() as u64, "container processing failed");
                    self.processing.store(false, Ordering::SeqCst);
                    tokio::time::sleep(self.config.retry_delay).await;
                }
            }
        }
    }

    /// Resolves with the container once a trigger finds it and the lock is claimed.
    async fn watch(&self) -> Container {
        let mut events = self.page.events();
        self.watching.store(true, Ordering::SeqCst);

        let container = self.watch_loop(&mut events).await;

        self.watching.store(false, Ordering::SeqCst);
        container
    }

    async fn watch_loop(&self, events: &mut tokio::sync::broadcast::Receiver<PageEvent>) -> Container {
        if let Some(container) = self.check("immediate") {
            return container;
        }

        let mut poll = interval_at(Instant::now() + self.config.poll_initial_delay, self.config.poll_interval);
        let mut mutation_due: Option<Instant> = None;
        let mut scroll_due: Option<Instant> = None;
        let mut events_open = true;

        loop {
            tokio::select! {
                event = events.recv(), if events_open => match event {
                    Ok(PageEvent::Mutation) | Err(RecvError::Lagged(_)) => {
                        mutation_due = Some(Instant::now() + self.config.mutation_debounce);
                    }
                    Ok(PageEvent::Scroll) => {
                        scroll_due = Some(Instant::now() + self.config.scroll_debounce);
                    }
                    Err(RecvError::Closed) => {
                        warn!("page event stream closed, relying on polling");
                        events_open = false;
                    }
                },
                _ = sleep_until(mutation_due.unwrap_or_else(Instant::now)), if mutation_due.is_some() => {
                    mutation_due = None;
                    if let Some(container) = self.check("mutation") {
                        return container;
                    }
                }
                _ = sleep_until(scroll_due.unwrap_or_else(Instant::now)), if scroll_due.is_some() => {
                    scroll_due = None;
                    if let Some(container) = self.check("scroll") {
                        return container;
                    }
                }
                _ = poll.tick() => {
                    if let Some(container) = self.check("poll") {
                        return container;
                    }
                }
            }
        }
    }

    fn check(&self, trigger: &'static str) -> Option<Container> {
        let container = match Container::capture(self.page.as_ref()) {
            Ok(Some(container)) => container,
            Ok(None) => return None,
            Err(e) => {
                warn!(trigger, error = %e, "container check failed");
                return None;
            }
        };

        if self.claim() {
            debug!(trigger, "container detected");
            Some(container)
        } else {
            None
        }
    }
}
