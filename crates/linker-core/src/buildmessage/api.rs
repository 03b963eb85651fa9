use crate::buildmessage::job::{Job, JobOptions, Message};
use crate::buildmessage::message_set::MessageSet;
use crate::buildmessage::progress::ProgressTracker;
use crate::buildmessage::scope::{
    current_job, current_message_set, current_nesting_level, current_progress, MessageSetHandle,
    CURRENT_JOB, CURRENT_MESSAGE_SET, CURRENT_PROGRESS, NESTING_LEVEL,
};
use crate::core::error::{LinkerError, LinkerResult};
use crate::core::stack;
use std::future::Future;
use std::sync::{Arc, Mutex};

/// Options accepted by `error()` (spec.md §4.A).
#[derive(Debug, Clone, Default)]
pub struct ErrorOptions {
    pub secondary: bool,
    pub downcase: bool,
    /// `Some(extra_skip)` mirrors `useMyCaller`: replace file/line/column/func
    /// with the caller's location, skipping `extra_skip` additional frames
    /// beyond the two framework frames this call itself adds.
    pub use_my_caller: Option<usize>,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub func: Option<String>,
}

/// A throwable value passed to `exception()` (spec.md §4.A/§7). `Syntax`
/// models the collaborator-reported parse errors that carry their own
/// location; `Generic` is any other error.
#[derive(Debug, Clone)]
pub enum Throwable {
    Syntax {
        message: String,
        file: Option<String>,
        line: Option<u32>,
        column: Option<u32>,
    },
    Generic(String),
}

impl Throwable {
    pub fn generic(message: impl Into<String>) -> Self {
        Throwable::Generic(message.into())
    }
}

struct ProgressGuard(ProgressTracker);

impl Drop for ProgressGuard {
    fn drop(&mut self) {
        self.0.report_progress_done();
    }
}

struct FiberBoundaryGuard;

impl Drop for FiberBoundaryGuard {
    fn drop(&mut self) {
        stack::pop_fiber_boundary();
    }
}

/// Scope a fiber boundary (spec.md §6 `markBottom`) around `fut`'s entire
/// lifetime, so a stack captured by `exception()` inside it is split into
/// `insideFiber`/`outsideFiber` by `stack::parse`. Each `forkJoin` child task
/// — serial or parallel — is one such fiber.
async fn with_fiber_boundary<Fut: Future>(fut: Fut) -> Fut::Output {
    let depth = stack::capture_frames().len();
    stack::push_fiber_boundary(depth);
    let _guard = FiberBoundaryGuard;
    fut.await
}

async fn run_with_progress<Fut: Future>(
    progress: Option<ProgressTracker>,
    fut: Fut,
) -> Fut::Output {
    match progress {
        Some(p) => {
            let _guard = ProgressGuard(p.clone());
            CURRENT_PROGRESS.scope(Some(p), fut).await
        }
        None => fut.await,
    }
}

/// `capture(options?, fn) -> MessageSet` (spec.md §4.A). Creates a fresh
/// `MessageSet`, optionally a root `Job`, installs them as current, runs
/// `fn`, and on every exit restores the prior scope and signals progress
/// done. Returns `fn`'s own result alongside the `MessageSet` for ergonomic
/// use from Rust call sites; the spec's `MessageSet`-only contract is the
/// second element.
pub async fn capture<F, Fut, T>(options: Option<JobOptions>, f: F) -> (T, MessageSet)
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    let ms_handle: MessageSetHandle = Arc::new(Mutex::new(MessageSet::new()));
    let root_job = options.map(Job::new);
    if let Some(job) = &root_job {
        ms_handle.lock().unwrap().push_job(job.clone());
    }

    let progress = current_progress()
        .map(|p| p.add_child("capture"))
        .unwrap_or_else(|| ProgressTracker::new_root("capture"));

    let result = CURRENT_MESSAGE_SET
        .scope(
            Some(Arc::clone(&ms_handle)),
            CURRENT_JOB.scope(
                root_job,
                NESTING_LEVEL.scope(0, run_with_progress(Some(progress), f())),
            ),
        )
        .await;

    let message_set = ms_handle.lock().unwrap().clone();
    (result, message_set)
}

/// `enterJob(options, fn) -> fn's result` (spec.md §4.A). If no `MessageSet`
/// is active, runs `fn` directly (only managing a child progress tracker).
/// Otherwise creates a `Job`, attaches it to the current job's children and
/// the current message set's flat list, installs it as current, and runs
/// `fn`.
pub async fn enter_job<F, Fut, T>(options: JobOptions, f: F) -> T
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    let child_progress = current_progress().map(|p| p.add_child(options.title.clone()));

    let Some(ms) = current_message_set() else {
        return run_with_progress(child_progress, f()).await;
    };

    let parent_job = current_job();
    let job = Job::new(options);
    if let Some(pj) = &parent_job {
        pj.add_child(&job);
    }
    ms.lock().unwrap().push_job(job.clone());
    let level = current_nesting_level() + 1;

    CURRENT_JOB
        .scope(
            Some(job),
            CURRENT_MESSAGE_SET.scope(
                Some(ms),
                NESTING_LEVEL.scope(level, run_with_progress(child_progress, f())),
            ),
        )
        .await
}

/// `true` iff the current job (or a descendant) already has a message.
pub fn job_has_messages() -> bool {
    current_job().map(|j| j.has_messages()).unwrap_or(false)
}

pub fn assert_in_job() -> LinkerResult<()> {
    if current_job().is_some() {
        Ok(())
    } else {
        Err(LinkerError::NoJob)
    }
}

pub fn assert_in_capture() -> LinkerResult<()> {
    if current_message_set().is_some() {
        Ok(())
    } else {
        Err(LinkerError::NoCapture)
    }
}

/// `error(message, options?)` (spec.md §4.A). Appends a message to the
/// current job, or fails with `NoJob` if none is active.
pub fn error(message: impl Into<String>, options: ErrorOptions) -> LinkerResult<()> {
    let job = current_job().ok_or(LinkerError::NoJob)?;

    if options.secondary && job.has_messages() {
        return Ok(());
    }

    let mut text = message.into();
    if options.downcase {
        let mut chars = text.chars();
        if let Some(first) = chars.next() {
            text = first.to_lowercase().collect::<String>() + chars.as_str();
        }
    }

    let mut msg = Message::new(text);
    msg.file = options.file;
    msg.line = options.line;
    msg.column = options.column;
    msg.func = options.func;

    if let Some(extra_skip) = options.use_my_caller {
        let raw = stack::capture_frames();
        let parts = stack::parse(&raw);
        if let Some(frame) = stack::top_frame_after_skip(&parts, 2 + extra_skip) {
            msg.file = frame.file;
            msg.line = frame.line;
            msg.column = frame.column;
            msg.func = frame.func;
        }
    }

    job.add_message(msg);
    Ok(())
}

/// `exception(err)` (spec.md §4.A/§7). Rethrows (as an `Err`) if no job is
/// active; otherwise attaches a structured message built from the
/// throwable's own location and the captured stack, preferring the
/// fiber-inside slice.
pub fn exception(throwable: &Throwable) -> LinkerResult<()> {
    let Some(job) = current_job() else {
        let description = match throwable {
            Throwable::Syntax {
                message,
                file,
                line,
                column,
            } => match (file, line, column) {
                (Some(f), Some(l), Some(c)) => format!("{}:{}:{}: {}", f, l, c, message),
                (Some(f), Some(l), None) => format!("{}:{}: {}", f, l, message),
                (Some(f), None, _) => format!("{}: {}", f, message),
                (None, _, _) => message.clone(),
            },
            Throwable::Generic(message) => message.clone(),
        };
        return Err(LinkerError::Rethrown(description));
    };

    let raw = stack::capture_frames();
    let parts = stack::parse(&raw);
    let frames = parts.inside_fiber.unwrap_or(parts.outside_fiber);

    let mut msg = match throwable {
        Throwable::Syntax {
            message,
            file,
            line,
            column,
        } => {
            let mut m = Message::new(message.clone());
            m.file = file.clone();
            m.line = *line;
            m.column = *column;
            m
        }
        Throwable::Generic(message) => Message::new(message.clone()),
    };
    msg.stack = frames;
    job.add_message(msg);
    Ok(())
}

/// `markBoundary(fn) -> fn` (spec.md §4.A). Tags `fn` so stack parsers
/// truncate traces at this frame.
pub fn mark_boundary<R>(f: impl FnOnce() -> R) -> R {
    let depth = stack::capture_frames().len();
    stack::mark_boundary(depth, f)
}

/// `mergeMessagesIntoCurrentJob(otherSet)` (spec.md §4.A). Flattens every
/// message held by `other`'s jobs onto the current job. `other` is consumed,
/// matching the "donor must not be mutated after merge" invariant by
/// ownership rather than a runtime check.
pub fn merge_messages_into_current_job(other: MessageSet) -> LinkerResult<()> {
    let job = current_job().ok_or(LinkerError::NoJob)?;
    for donor_job in other.jobs() {
        for message in donor_job.own_messages() {
            job.add_message(message);
        }
    }
    Ok(())
}

/// `forkJoin(options?, iterable, fn) -> results` (spec.md §4.A). A parent
/// job wraps one child job per element. `parallel: true` (the default)
/// schedules all children concurrently via `tokio::spawn`; `parallel: false`
/// awaits each child before starting the next. Either way, errors are
/// collected rather than cancelling siblings; once every child has finished,
/// the first collected error (by collection order) is returned, or the
/// ordered result list if none occurred.
#[derive(Debug, Clone)]
pub struct ForkJoinOptions {
    pub title: String,
    pub parallel: bool,
}

impl Default for ForkJoinOptions {
    fn default() -> Self {
        Self {
            title: "forkJoin".to_string(),
            parallel: true,
        }
    }
}

pub async fn fork_join<T, R, E, F, Fut>(
    options: ForkJoinOptions,
    items: Vec<T>,
    f: F,
) -> Result<Vec<R>, E>
where
    T: Send + 'static,
    R: Send + 'static,
    E: Send + 'static,
    F: Fn(T) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
{
    let parallel = options.parallel;

    enter_job(JobOptions::titled(options.title.clone()), move || async move {
        if parallel {
            // tokio::spawn starts a new task; task-local scope does not
            // propagate across that boundary on its own, so the parent
            // job/message-set/nesting level are captured here and
            // re-installed explicitly inside each spawned future.
            let parent_job = current_job();
            let parent_ms = current_message_set();
            let level = current_nesting_level();

            let mut handles = Vec::with_capacity(items.len());
            for (i, item) in items.into_iter().enumerate() {
                let f = f.clone();
                let scoped = CURRENT_JOB.scope(
                    parent_job.clone(),
                    CURRENT_MESSAGE_SET.scope(
                        parent_ms.clone(),
                        NESTING_LEVEL.scope(
                            level,
                            with_fiber_boundary(enter_job(
                                JobOptions::titled(format!("item {}", i)),
                                move || f(item),
                            )),
                        ),
                    ),
                );
                handles.push(tokio::spawn(scoped));
            }

            let mut results = Vec::with_capacity(handles.len());
            let mut first_err = None;
            for handle in handles {
                match handle.await.expect("forkJoin child task panicked") {
                    Ok(value) => results.push(value),
                    Err(e) => {
                        if first_err.is_none() {
                            first_err = Some(e);
                        }
                    }
                }
            }
            match first_err {
                Some(e) => Err(e),
                None => Ok(results),
            }
        } else {
            let mut results = Vec::with_capacity(items.len());
            let mut first_err = None;
            for (i, item) in items.into_iter().enumerate() {
                let result = with_fiber_boundary(enter_job(
                    JobOptions::titled(format!("item {}", i)),
                    || f(item),
                ))
                .await;
                match result {
                    Ok(value) => results.push(value),
                    Err(e) => {
                        if first_err.is_none() {
                            first_err = Some(e);
                        }
                    }
                }
            }
            match first_err {
                Some(e) => Err(e),
                None => Ok(results),
            }
        }
    })
    .await
}
