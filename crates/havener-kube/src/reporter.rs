//! Reporting capability injected into the deploy pipeline and the purger
//!
//! Library code never talks to a global logger directly. The binary decides
//! how messages are rendered by handing a [`Reporter`] to each workflow.

use tracing::{debug, info, warn};

/// Sink for progress and status messages
pub trait Reporter: Send + Sync {
    fn debug(&self, message: &str);

    fn info(&self, message: &str);

    fn warn(&self, message: &str);

    /// A titled status block, e.g. a release summary with its notes
    fn status(&self, title: &str, message: &str);

    /// Output of a finished lifecycle hook
    fn task_output(&self, title: &str, task: &str, output: &str) {
        if output.is_empty() {
            self.info(&format!("{}: {}", title, task));
        } else {
            self.info(&format!("{}: {}\n{}", title, task, output));
        }
    }
}

/// Forwards everything to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn debug(&self, message: &str) {
        debug!("{}", message);
    }

    fn info(&self, message: &str) {
        info!("{}", message);
    }

    fn warn(&self, message: &str) {
        warn!("{}", message);
    }

    fn status(&self, title: &str, message: &str) {
        info!(title, "{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::RecordingReporter;

    #[test]
    fn test_task_output_default_format() {
        let reporter = RecordingReporter::new();
        reporter.task_output("After Chart web", "smoke", "ok\nready");
        reporter.task_output("After Chart web", "quiet", "");

        assert_eq!(
            reporter.at_level("info"),
            vec!["After Chart web: smoke\nok\nready", "After Chart web: quiet"]
        );
    }

    #[test]
    fn test_tracing_reporter_as_trait_object() {
        let reporter: &dyn Reporter = &TracingReporter;
        reporter.debug("debug");
        reporter.warn("warn");
        reporter.status("Upgrade", "done");
        reporter.task_output("Predeployment Steps", "prepare", "");
    }
}
