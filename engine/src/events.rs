//! Engine events
//!
//! Every decision the engine makes about a submission or a badge is
//! broadcast on an [`EventBus`]. Hosts subscribe to audit, notify or
//! invalidate caches; the engine never waits on a subscriber.
//!
//! With `events.log_events` set, [`TrialPipeline`](crate::TrialPipeline)
//! runs a [`LoggingEventListener`] for its lifetime.

use std::sync::Arc;

use taskmarket_validation::TaskCategory;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::ledger::BadgeLevel;

/// Events emitted by the engine
#[derive(Debug, Clone)]
pub enum EngineEvent {
    SubmissionReviewed {
        worker_id: String,
        task_id: String,
        valid: bool,
        errors: usize,
        warnings: usize,
    },
    SubmissionThrottled {
        worker_id: String,
        origin: String,
        retry_after_secs: u64,
    },
    /// Trial passed; `created` is set for the worker's first badge in `category`
    BadgeAwarded {
        worker_id: String,
        category: TaskCategory,
        created: bool,
        tasks_completed: u32,
    },
    /// Paid work folded into an existing badge
    BadgeProgressed {
        worker_id: String,
        category: TaskCategory,
        tasks_completed: u32,
        average_rating: Option<f64>,
    },
    TierChanged {
        worker_id: String,
        category: TaskCategory,
        from: BadgeLevel,
        to: BadgeLevel,
    },
}

impl EngineEvent {
    /// Worker the event is about
    pub fn worker_id(&self) -> &str {
        match self {
            EngineEvent::SubmissionReviewed { worker_id, .. }
            | EngineEvent::SubmissionThrottled { worker_id, .. }
            | EngineEvent::BadgeAwarded { worker_id, .. }
            | EngineEvent::BadgeProgressed { worker_id, .. }
            | EngineEvent::TierChanged { worker_id, .. } => worker_id,
        }
    }

    /// Stable snake_case name, for log fields and metrics labels
    pub fn kind(&self) -> &'static str {
        match self {
            EngineEvent::SubmissionReviewed { .. } => "submission_reviewed",
            EngineEvent::SubmissionThrottled { .. } => "submission_throttled",
            EngineEvent::BadgeAwarded { .. } => "badge_awarded",
            EngineEvent::BadgeProgressed { .. } => "badge_progressed",
            EngineEvent::TierChanged { .. } => "tier_changed",
        }
    }

    /// Badge category, for badge events
    pub fn category(&self) -> Option<&TaskCategory> {
        match self {
            EngineEvent::BadgeAwarded { category, .. }
            | EngineEvent::BadgeProgressed { category, .. }
            | EngineEvent::TierChanged { category, .. } => Some(category),
            _ => None,
        }
    }
}

/// Receives events from a listener task spawned by [`spawn_listener`]
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &EngineEvent);
}

/// Broadcast channel for engine events
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Send to every current subscriber; a bus with none drops the event.
    pub fn emit(&self, event: EngineEvent) {
        trace!(kind = event.kind(), worker_id = %event.worker_id(), "Emitting engine event");
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes events to the log: badge changes at info, throttling at warn,
/// everything else at debug
pub struct LoggingEventListener;

impl EventListener for LoggingEventListener {
    fn on_event(&self, event: &EngineEvent) {
        match event {
            EngineEvent::BadgeAwarded {
                worker_id,
                category,
                created,
                tasks_completed,
            } => {
                info!(
                    worker_id = %worker_id,
                    category = %category,
                    created = created,
                    tasks_completed = tasks_completed,
                    "Badge awarded"
                );
            }
            EngineEvent::TierChanged {
                worker_id,
                category,
                from,
                to,
            } => {
                info!(
                    worker_id = %worker_id,
                    category = %category,
                    from = %from,
                    to = %to,
                    "Badge tier changed"
                );
            }
            EngineEvent::SubmissionThrottled {
                worker_id,
                origin,
                retry_after_secs,
            } => {
                warn!(
                    worker_id = %worker_id,
                    origin = %origin,
                    retry_after_secs = retry_after_secs,
                    "Submission throttled"
                );
            }
            EngineEvent::SubmissionReviewed {
                worker_id,
                task_id,
                valid,
                errors,
                warnings,
            } => {
                debug!(
                    worker_id = %worker_id,
                    task_id = %task_id,
                    valid = valid,
                    errors = errors,
                    warnings = warnings,
                    "Submission reviewed"
                );
            }
            EngineEvent::BadgeProgressed {
                worker_id,
                category,
                tasks_completed,
                average_rating,
            } => {
                debug!(
                    worker_id = %worker_id,
                    category = %category,
                    tasks_completed = tasks_completed,
                    average_rating = ?average_rating,
                    "Badge progressed"
                );
            }
        }
    }
}

/// Feed every event on `bus` to `listener` from a background task.
///
/// The task ends once the bus is dropped; lagging only skips events.
pub fn spawn_listener<L>(bus: &EventBus, listener: L) -> JoinHandle<()>
where
    L: EventListener + 'static,
{
    let mut receiver = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => listener.on_event(&event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped = skipped, "Event listener lagged, skipped events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed, stopping listener");
                    break;
                }
            }
        }
    })
}

/// [`spawn_listener`] with a [`LoggingEventListener`]
pub fn spawn_logging_listener(bus: Arc<EventBus>) -> JoinHandle<()> {
    spawn_listener(&bus, LoggingEventListener)
}
