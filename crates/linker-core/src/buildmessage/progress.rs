use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressState {
    Running,
    Done,
}

#[derive(Debug)]
pub struct ProgressNodeInner {
    pub title: String,
    pub state: ProgressState,
    pub children: Vec<ProgressHandle>,
}

pub type ProgressHandle = Arc<Mutex<ProgressNodeInner>>;

/// Tree of tasks, each with a title, current state, and children (spec.md
/// §3 Progress tracker). Roots exist at process start; `capture`/`enter_job`
/// create subtasks and must release them (`report_progress_done`) on every
/// exit path.
#[derive(Clone)]
pub struct ProgressTracker(pub ProgressHandle);

impl ProgressTracker {
    pub fn new_root(title: impl Into<String>) -> Self {
        Self(Arc::new(Mutex::new(ProgressNodeInner {
            title: title.into(),
            state: ProgressState::Running,
            children: Vec::new(),
        })))
    }

    pub fn handle(&self) -> ProgressHandle {
        Arc::clone(&self.0)
    }

    /// Create a child subtask under this tracker and return it.
    pub fn add_child(&self, title: impl Into<String>) -> ProgressTracker {
        let child = ProgressTracker::new_root(title);
        self.0.lock().unwrap().children.push(child.handle());
        child
    }

    pub fn state(&self) -> ProgressState {
        self.0.lock().unwrap().state
    }

    /// Mark this task done, releasing it. Idempotent.
    pub fn report_progress_done(&self) {
        self.0.lock().unwrap().state = ProgressState::Done;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_tracker_starts_running() {
        let tracker = ProgressTracker::new_root("link");
        assert_eq!(tracker.state(), ProgressState::Running);
    }

    #[test]
    fn report_progress_done_marks_state() {
        let tracker = ProgressTracker::new_root("link");
        tracker.report_progress_done();
        assert_eq!(tracker.state(), ProgressState::Done);
    }

    #[test]
    fn child_tasks_are_independent() {
        let root = ProgressTracker::new_root("root");
        let child = root.add_child("child");
        child.report_progress_done();
        assert_eq!(root.state(), ProgressState::Running);
        assert_eq!(child.state(), ProgressState::Done);
    }
}
