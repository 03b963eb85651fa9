use crate::buildmessage::job::Job;
use crate::buildmessage::message_set::MessageSet;
use crate::buildmessage::progress::ProgressTracker;
use std::sync::{Arc, Mutex};

/// The four dynamically-scoped values the build-message framework threads
/// through every `capture`/`enter_job` (spec.md §3 "Lifecycle", §9 "Dynamic
/// scope via storage cells"). Each is task-local: `tokio::task_local!`'s
/// `.scope()` pushes a value for the duration of a future and restores the
/// previous one on every exit path, including a panic or an early return,
/// which gives us the LIFO restorer semantics spec.md §4.A requires without
/// hand-rolled guard types.
pub type MessageSetHandle = Arc<Mutex<MessageSet>>;

tokio::task_local! {
    pub static CURRENT_MESSAGE_SET: Option<MessageSetHandle>;
    pub static CURRENT_JOB: Option<Job>;
    pub static NESTING_LEVEL: usize;
    pub static CURRENT_PROGRESS: Option<ProgressTracker>;
}

pub fn current_message_set() -> Option<MessageSetHandle> {
    CURRENT_MESSAGE_SET
        .try_with(|ms| ms.clone())
        .unwrap_or(None)
}

pub fn current_job() -> Option<Job> {
    CURRENT_JOB.try_with(|job| job.clone()).unwrap_or(None)
}

pub fn current_nesting_level() -> usize {
    NESTING_LEVEL.try_with(|n| *n).unwrap_or(0)
}

pub fn current_progress() -> Option<ProgressTracker> {
    CURRENT_PROGRESS
        .try_with(|p| p.clone())
        .unwrap_or(None)
}
