use crate::core::stack::Frame;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// One accumulated diagnostic (spec.md §3 Job).
#[derive(Debug, Clone)]
pub struct Message {
    pub message: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub func: Option<String>,
    pub stack: Vec<Frame>,
    pub tags: Vec<String>,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            file: None,
            line: None,
            column: None,
            func: None,
            stack: Vec::new(),
            tags: Vec::new(),
        }
    }

    /// A "nontrivial" stack per §4.A's formatting contract: more than one frame.
    pub fn has_nontrivial_stack(&self) -> bool {
        self.stack.len() > 1
    }
}

/// Options accepted by `enter_job` to construct a root `Job`.
#[derive(Debug, Clone, Default)]
pub struct JobOptions {
    pub title: String,
    pub root_path: Option<PathBuf>,
}

impl JobOptions {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            root_path: None,
        }
    }
}

#[derive(Debug)]
pub struct JobInner {
    pub title: String,
    pub root_path: Option<PathBuf>,
    pub messages: Vec<Message>,
    pub children: Vec<Arc<Mutex<JobInner>>>,
}

pub type JobHandle = Arc<Mutex<JobInner>>;

/// Tree node with title, optional root path, ordered messages, ordered
/// children (spec.md §3 Job). Shared via `Arc<Mutex<_>>` so a `forkJoin`
/// child task and its parent can both hold a handle to the same tree.
#[derive(Clone)]
pub struct Job(pub JobHandle);

impl Job {
    pub fn new(options: JobOptions) -> Self {
        Self(Arc::new(Mutex::new(JobInner {
            title: options.title,
            root_path: options.root_path,
            messages: Vec::new(),
            children: Vec::new(),
        })))
    }

    pub fn handle(&self) -> JobHandle {
        Arc::clone(&self.0)
    }

    pub fn title(&self) -> String {
        self.0.lock().unwrap().title.clone()
    }

    pub fn root_path(&self) -> Option<PathBuf> {
        self.0.lock().unwrap().root_path.clone()
    }

    pub fn add_message(&self, message: Message) {
        self.0.lock().unwrap().messages.push(message);
    }

    pub fn add_child(&self, child: &Job) {
        self.0.lock().unwrap().children.push(child.handle());
    }

    pub fn own_messages(&self) -> Vec<Message> {
        self.0.lock().unwrap().messages.clone()
    }

    /// `true` iff this job, or any descendant (transitively), has a message.
    /// Used by `error(.., secondary: true)` (spec.md §4.A) and by
    /// `job_has_messages`.
    pub fn has_messages(&self) -> bool {
        let inner = self.0.lock().unwrap();
        if !inner.messages.is_empty() {
            return true;
        }
        inner
            .children
            .iter()
            .any(|c| Job(Arc::clone(c)).has_messages())
    }
}
