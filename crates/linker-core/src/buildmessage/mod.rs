//! Diagnostic/job substrate shared by every linking stage (spec.md §3/§4.A).
//!
//! A [`capture`] call owns a [`MessageSet`] and, through it, a tree of
//! [`Job`]s; [`enter_job`] and [`fork_join`] nest new jobs under whichever one
//! is current. Everything else in this module reads or writes that ambient
//! state rather than taking it as an explicit parameter, matching the
//! collaborator's own dynamic-scope design.

pub mod api;
pub mod job;
pub mod message_set;
pub mod progress;
pub mod scope;

pub use api::{
    assert_in_capture, assert_in_job, capture, enter_job, error, exception,
    fork_join, job_has_messages, mark_boundary, merge_messages_into_current_job,
    ErrorOptions, ForkJoinOptions, Throwable,
};
pub use job::{Job, JobHandle, JobOptions, Message};
pub use message_set::MessageSet;
pub use progress::{ProgressHandle, ProgressState, ProgressTracker};
pub use scope::{current_job, current_message_set, current_nesting_level, current_progress};
