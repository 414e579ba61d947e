//! Cron-driven wakeup and digest jobs.
//!
//! Cron expressions carry a seconds field: `0 */15 * * * *` fires every
//! fifteen minutes, `0 0 8 * * *` every day at 08:00 UTC.

use anyhow::Context;
use config::{DigestConfig, SchedulerConfig};
use services::{
    agents::{AgentBackend, AgentService},
    digest::DigestService,
    wakeup::WakeupService,
};
use std::{sync::Arc, time::Duration};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info, warn};

const JOB_TIMEOUT: Duration = Duration::from_secs(600);

/// Scheduler with both jobs registered but not yet started.
pub async fn build_scheduler(
    agents: AgentService,
    config: &SchedulerConfig,
    digest_config: DigestConfig,
) -> anyhow::Result<JobScheduler> {
    let scheduler = JobScheduler::new()
        .await
        .context("creating job scheduler")?;

    let backend: Arc<dyn AgentBackend> = agents.backend().clone();
    let wakeups = Arc::new(WakeupService::from_config(backend.clone(), config));
    let digests = Arc::new(DigestService::new(digest_config)?);
    let digest_agent = config.digest_agent_id.clone();

    let wakeup_job = Job::new_async(config.wakeup_cron.as_str(), move |_id, _lock| {
        let wakeups = wakeups.clone();
        Box::pin(async move {
            match tokio::time::timeout(JOB_TIMEOUT, wakeups.run_all()).await {
                Ok(Ok(report)) => {
                    for failure in &report.errors {
                        warn!(agent_id = %failure.agent_id, error = %failure.error, "Wakeup failed");
                    }
                }
                Ok(Err(err)) => error!(error = %err, "Wakeup job failed"),
                Err(_) => warn!(timeout_secs = JOB_TIMEOUT.as_secs(), "Wakeup job timed out"),
            }
        })
    })
    .with_context(|| format!("invalid wakeup cron '{}'", config.wakeup_cron))?;

    let digest_job = Job::new_async(config.digest_cron.as_str(), move |_id, _lock| {
        let digests = digests.clone();
        let backend = backend.clone();
        let digest_agent = digest_agent.clone();
        Box::pin(async move {
            let run = async {
                let digest = digests.generate(None).await?;
                digests
                    .deliver(Some(backend.as_ref()), digest_agent.as_deref(), &digest)
                    .await
            };
            match tokio::time::timeout(JOB_TIMEOUT, run).await {
                Ok(Ok(outcome)) => debug!(?outcome, "Digest job finished"),
                Ok(Err(err)) => error!(error = %err, "Digest job failed"),
                Err(_) => warn!(timeout_secs = JOB_TIMEOUT.as_secs(), "Digest job timed out"),
            }
        })
    })
    .with_context(|| format!("invalid digest cron '{}'", config.digest_cron))?;

    scheduler
        .add(wakeup_job)
        .await
        .context("registering wakeup job")?;
    scheduler
        .add(digest_job)
        .await
        .context("registering digest job")?;

    Ok(scheduler)
}

/// Run the jobs until Ctrl-C.
pub async fn run_until_interrupted(
    agents: AgentService,
    config: SchedulerConfig,
    digest_config: DigestConfig,
) -> anyhow::Result<()> {
    let mut scheduler = build_scheduler(agents, &config, digest_config).await?;
    scheduler.start().await.context("starting scheduler")?;
    info!(
        wakeup_cron = %config.wakeup_cron,
        digest_cron = %config.digest_cron,
        data_dir = %config.data_dir.display(),
        "Scheduler running"
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutting down scheduler");
    scheduler.shutdown().await.context("stopping scheduler")?;
    Ok(())
}
