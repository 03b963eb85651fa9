use crate::core::LinkerError;

/// Provides a one-line suggestion for a fatal [`LinkerError`], the same way
/// the diagnostics here are meant to be surfaced to a caller that hit a
/// fatal condition rather than an accumulated job message.
pub trait ErrorHelp {
    fn help(&self) -> Option<String>;
}

impl ErrorHelp for LinkerError {
    fn help(&self) -> Option<String> {
        match self {
            LinkerError::NoJob => Some(
                "Suggestion: wrap the call in buildmessage::enter_job or buildmessage::capture"
                    .to_string(),
            ),
            LinkerError::NoCapture => Some(
                "Suggestion: the diagnostic tree is only available inside buildmessage::capture"
                    .to_string(),
            ),
            LinkerError::RuntimeRequired => Some(
                "Suggestion: add a non-unordered dependency on the runtime package, or drop the declared exports/main module"
                    .to_string(),
            ),
            LinkerError::LegacyLinkerUnsupported => Some(
                "Suggestion: unset LINKER_LEGACY or set it to \"new\"".to_string(),
            ),
            LinkerError::SourceMap(_) => Some(
                "Suggestion: check that every InputFile's upstream source map is well-formed JSON"
                    .to_string(),
            ),
            _ => None,
        }
    }
}

/// Format an error with its suggestion, if any.
pub fn format_error_with_help(error: &LinkerError) -> String {
    let mut output = format!("error: {}", error);

    if let Some(help) = error.help() {
        output.push_str("\n\n");
        output.push_str(&help);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_job_has_a_suggestion() {
        let error = LinkerError::NoJob;
        assert!(error.help().is_some());
        assert!(error.help().unwrap().contains("enter_job"));
    }

    #[test]
    fn io_error_has_no_suggestion() {
        let error = LinkerError::Io(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        assert!(error.help().is_none());
    }
}
