pub mod tasks;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, info};

use crate::bot::AppState;

type JobFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Cron-driven maintenance jobs that run next to the dispatcher.
/// Every job gets its own handle to the shared [`AppState`].
pub struct Scheduler {
    inner: JobScheduler,
    state: Arc<AppState>,
}

impl Scheduler {
    pub async fn new(state: Arc<AppState>) -> Result<Self> {
        let inner = JobScheduler::new()
            .await
            .context("Failed to create job scheduler")?;
        Ok(Self { inner, state })
    }

    /// Register `task` to run on every tick of a six-field cron expression
    pub async fn add_job<F>(&self, cron_expr: &str, name: &str, task: F) -> Result<()>
    where
        F: Fn(Arc<AppState>) -> JobFuture + Send + Sync + 'static,
    {
        let job_name = name.to_string();
        let state = self.state.clone();
        let job = Job::new_async(cron_expr, move |_uuid, _lock| {
            let fut = task(state.clone());
            let name = job_name.clone();
            Box::pin(async move {
                debug!("Running job '{}'", name);
                fut.await;
            })
        })
        .with_context(|| format!("Invalid cron expression for job '{}': {}", name, cron_expr))?;

        self.inner
            .add(job)
            .await
            .with_context(|| format!("Failed to add job '{}'", name))?;

        info!("Job '{}' scheduled with cron: {}", name, cron_expr);
        Ok(())
    }

    pub async fn start(&self) -> Result<()> {
        self.inner
            .start()
            .await
            .context("Failed to start scheduler")?;
        info!("Scheduler started");
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner
            .shutdown()
            .await
            .context("Failed to shutdown scheduler")?;
        info!("Scheduler stopped");
        Ok(())
    }
}
