//! Lifecycle hooks
//!
//! Hooks are plain shell commands declared in the configuration. They run one
//! after another on the blocking thread pool, the first failure stops the
//! remaining hooks of the list.

use std::sync::Arc;

use havener_core::{CommandRunner, Task};

use crate::error::{KubeError, Result};
use crate::reporter::Reporter;

/// Runs hook lists through a shared [`CommandRunner`]
#[derive(Clone)]
pub struct HookRunner {
    runner: Arc<dyn CommandRunner>,
    reporter: Arc<dyn Reporter>,
}

impl HookRunner {
    pub fn new(runner: Arc<dyn CommandRunner>, reporter: Arc<dyn Reporter>) -> Self {
        Self { runner, reporter }
    }

    /// Execute `tasks` in order, reporting their output under `title`
    pub async fn run_all(&self, title: &str, tasks: &[Task]) -> Result<()> {
        if tasks.is_empty() {
            return Ok(());
        }

        self.reporter
            .debug(&format!("{}: running {} task(s)", title, tasks.len()));

        for task in tasks {
            let output = self.run(task).await?;
            self.reporter.task_output(title, &task.name, output.trim());
        }

        Ok(())
    }

    async fn run(&self, task: &Task) -> Result<String> {
        let runner = Arc::clone(&self.runner);
        let cmd = task.cmd.clone();

        let output = tokio::task::spawn_blocking(move || runner.run(&cmd)).await?;
        output.map_err(|e| KubeError::Hook {
            task: task.name.clone(),
            message: e.to_string(),
        })
    }
}
