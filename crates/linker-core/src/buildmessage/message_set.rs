use crate::buildmessage::job::Job;
use std::collections::HashSet;

/// Ordered list of jobs accumulated during one `capture` (spec.md §3
/// MessageSet). Every job created with `enter_job` while a message set is
/// active is appended here, flat, in the order `enter_job` returned —
/// nesting is still visible via each `Job`'s own children, but formatting
/// walks this flat list.
#[derive(Clone, Default)]
pub struct MessageSet {
    jobs: Vec<Job>,
}

impl MessageSet {
    pub fn new() -> Self {
        Self { jobs: Vec::new() }
    }

    pub fn push_job(&mut self, job: Job) {
        self.jobs.push(job);
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn is_empty(&self) -> bool {
        !self.jobs.iter().any(|j| j.has_messages())
    }

    /// Merge another message set's jobs into this one. Takes `other` by
    /// value: once merged, the donor is consumed and cannot be mutated
    /// further (spec.md §3's invariant is enforced by ownership, not by a
    /// runtime check).
    pub fn merge(&mut self, other: MessageSet) {
        self.jobs.extend(other.jobs);
    }

    /// Render every job with at least one message as a `"While <title>:\n"`
    /// block of indented `file:line:column: message` lines, each optionally
    /// followed by `  at func (file:line:col)` frames, per spec.md §4.A's
    /// formatting contract. Exact duplicate lines within one job are
    /// suppressed.
    pub fn format_messages(&self) -> String {
        let mut out = String::new();
        for job in &self.jobs {
            let messages = job.own_messages();
            if messages.is_empty() {
                continue;
            }

            out.push_str("While ");
            out.push_str(&job.title());
            out.push_str(":\n");

            let mut seen = HashSet::new();
            for message in &messages {
                let mut lines = Vec::new();

                let prefix = match (&message.file, message.line, message.column) {
                    (Some(file), Some(line), Some(column)) => {
                        format!("{}:{}:{}: {}", file, line, column, message.message)
                    }
                    (Some(file), None, _) => format!("{}: {}", file, message.message),
                    (None, _, _) => format!("error: {}", message.message),
                    (Some(file), Some(line), None) => {
                        format!("{}:{}: {}", file, line, message.message)
                    }
                };
                lines.push(prefix);

                if message.has_nontrivial_stack() {
                    for frame in &message.stack {
                        lines.push(format!(
                            "  at {} ({}:{}:{})",
                            frame.func.as_deref().unwrap_or("<anonymous>"),
                            frame.file.as_deref().unwrap_or("<unknown>"),
                            frame.line.unwrap_or(0),
                            frame.column.unwrap_or(0),
                        ));
                    }
                }

                let rendered = lines.join("\n");
                if seen.insert(rendered.clone()) {
                    out.push_str("  ");
                    out.push_str(&rendered.replace('\n', "\n  "));
                    out.push('\n');
                }
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buildmessage::job::{JobOptions, Message};

    #[test]
    fn empty_set_formats_to_empty_string() {
        let set = MessageSet::new();
        assert_eq!(set.format_messages(), "");
        assert!(set.is_empty());
    }

    #[test]
    fn formats_file_message() {
        let mut set = MessageSet::new();
        let job = Job::new(JobOptions::titled("linking package foo"));
        let mut msg = Message::new("unexpected token");
        msg.file = Some("a.js".to_string());
        msg.line = Some(3);
        msg.column = Some(5);
        job.add_message(msg);
        set.push_job(job);

        let formatted = set.format_messages();
        assert!(formatted.starts_with("While linking package foo:\n"));
        assert!(formatted.contains("a.js:3:5: unexpected token"));
    }

    #[test]
    fn file_less_message_gets_error_prefix() {
        let mut set = MessageSet::new();
        let job = Job::new(JobOptions::titled("root"));
        job.add_message(Message::new("no runtime"));
        set.push_job(job);

        assert!(set.format_messages().contains("error: no runtime"));
    }

    #[test]
    fn duplicate_lines_are_suppressed() {
        let mut set = MessageSet::new();
        let job = Job::new(JobOptions::titled("root"));
        job.add_message(Message::new("dup"));
        job.add_message(Message::new("dup"));
        set.push_job(job);

        let formatted = set.format_messages();
        assert_eq!(formatted.matches("error: dup").count(), 1);
    }

    #[test]
    fn merge_appends_donor_jobs() {
        let mut set = MessageSet::new();
        set.push_job(Job::new(JobOptions::titled("a")));

        let mut other = MessageSet::new();
        other.push_job(Job::new(JobOptions::titled("b")));

        set.merge(other);
        assert_eq!(set.jobs().len(), 2);
    }

    #[test]
    fn is_empty_is_false_when_a_descendant_has_a_message() {
        let mut set = MessageSet::new();
        let root = Job::new(JobOptions::titled("root"));
        let child = Job::new(JobOptions::titled("child"));
        root.add_child(&child);
        child.add_message(Message::new("boom"));
        set.push_job(root);

        assert!(!set.is_empty());
    }
}
