use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{error, info, warn};

use locus_common::error::{LocusError, Result};
use locus_common::{
    clean_url, Config, DiscoveryRequest, Job, JobId, JobStatus, Report, Summary,
};

use super::progress::Stage;
use super::store::{JobSlot, JobStore};
use crate::agents::{default_agents, AgentOutput, AgentRequest, SourceAgent};
use crate::infra::LiveBackends;
use crate::pipeline::{aggregate, DedupSettings, Deduplicator};
use crate::traits::Backends;

/// Most requests accepted by one `submit_batch` call.
pub const MAX_BATCH_SIZE: usize = 50;
/// Upper bound on `list_jobs`.
pub const MAX_LIST_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy)]
pub struct ControllerSettings {
    /// Time budget for each agent task.
    pub agent_timeout: Duration,
    pub dedup: DedupSettings,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            agent_timeout: Duration::from_secs(90),
            dedup: DedupSettings::default(),
        }
    }
}

impl ControllerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            agent_timeout: config.agent_timeout,
            dedup: DedupSettings {
                threshold: config.similarity_threshold,
                ..DedupSettings::default()
            },
        }
    }
}

/// Owns job lifecycles: accepts requests, runs the agent → aggregate →
/// dedup pipeline in the background and answers status reads.
#[derive(Clone)]
pub struct JobController {
    store: Arc<JobStore>,
    agents: Arc<[Arc<dyn SourceAgent>]>,
    backends: Arc<dyn Backends>,
    settings: ControllerSettings,
}

impl JobController {
    pub fn new(backends: Arc<dyn Backends>) -> Self {
        Self {
            store: Arc::new(JobStore::new()),
            agents: default_agents().into(),
            backends,
            settings: ControllerSettings::default(),
        }
    }

    /// Live backends and settings from configuration.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let backends = LiveBackends::new(config.clone())?;
        Ok(Self::new(Arc::new(backends)).with_settings(ControllerSettings::from_config(config)))
    }

    /// Replace the agent set. Order is registration order.
    pub fn with_agents(mut self, agents: Vec<Arc<dyn SourceAgent>>) -> Self {
        self.agents = agents.into();
        self
    }

    pub fn with_settings(mut self, settings: ControllerSettings) -> Self {
        self.settings = settings;
        self
    }

    // --- Submission ---

    /// Validate, record the job as pending and start it in the background.
    /// Must be called inside a tokio runtime.
    pub fn submit(&self, request: DiscoveryRequest) -> Result<JobId> {
        validate(&request)?;
        Ok(self.accept(request))
    }

    /// Submit 1 to 50 requests. Nothing is accepted if any request is invalid.
    pub fn submit_batch(&self, requests: Vec<DiscoveryRequest>) -> Result<Vec<JobId>> {
        if requests.is_empty() || requests.len() > MAX_BATCH_SIZE {
            return Err(LocusError::Validation(format!(
                "batch must contain between 1 and {MAX_BATCH_SIZE} requests, got {}",
                requests.len()
            )));
        }
        for (i, request) in requests.iter().enumerate() {
            validate(request)
                .map_err(|e| LocusError::Validation(format!("request {i}: {e}")))?;
        }
        Ok(requests.into_iter().map(|r| self.accept(r)).collect())
    }

    fn accept(&self, request: DiscoveryRequest) -> JobId {
        let job = Job::new(request.company.trim());
        let job_id = job.id;
        self.store.insert(job);
        info!(job_id = %job_id, company = request.company.trim(), "Job accepted");
        self.spawn_supervised(job_id, request);
        job_id
    }

    /// Run the job in its own task, watched by a second task so a panic
    /// anywhere in the pipeline still ends the job as failed.
    fn spawn_supervised(&self, job_id: JobId, request: DiscoveryRequest) {
        let controller = self.clone();
        tokio::spawn(async move {
            let worker = controller.clone();
            let handle = tokio::spawn(async move { worker.run(job_id, request).await });
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(job_id = %job_id, error = %e, "Job run did not record a result"),
                Err(e) => {
                    error!(job_id = %job_id, error = %e, "Job pipeline panicked");
                    controller.fail_if_active(job_id, format!("pipeline task panicked: {e}"));
                }
            }
        });
    }

    fn fail_if_active(&self, job_id: JobId, reason: String) {
        let Some(slot) = self.store.slot(job_id) else {
            return;
        };
        let _ = slot.update(|job| {
            if job.status.is_terminal() {
                Ok(())
            } else {
                job.fail(reason)
            }
        });
    }

    // --- Execution ---

    /// Execute a pending job to a terminal state. Pipeline errors end the
    /// job as failed and return `Ok`; an `Err` means the job could not be
    /// started or its outcome could not be recorded.
    pub async fn run(&self, job_id: JobId, request: DiscoveryRequest) -> Result<()> {
        let slot = self
            .store
            .slot(job_id)
            .ok_or(LocusError::JobNotFound(job_id))?;
        slot.update(|job| job.start(Stage::Initializing.progress(), Stage::Initializing.message()))?;
        info!(job_id = %job_id, "Job running");

        match self.execute(job_id, &slot, request).await {
            Ok(report) => {
                let total = report.locations.len();
                slot.update(|job| job.complete(report))?;
                info!(job_id = %job_id, locations = total, "Job completed");
            }
            Err(e) => {
                error!(job_id = %job_id, error = %e, "Job failed");
                slot.update(|job| job.fail(e.to_string()))?;
            }
        }
        Ok(())
    }

    async fn execute(
        &self,
        job_id: JobId,
        slot: &JobSlot,
        request: DiscoveryRequest,
    ) -> Result<Report> {
        validate(&request)?;
        let company = request.company.trim().to_string();
        let url_supplied = request
            .url
            .as_deref()
            .is_some_and(|u| !u.trim().is_empty());
        let url = request.url.as_deref().and_then(clean_url);
        if url_supplied && url.is_none() {
            warn!(job_id = %job_id, "Supplied URL is unusable, website agent will be skipped");
        }

        // Setup problems are reported like agent failures; the job still completes.
        let mut setup_errors = Vec::new();
        if self.agents.is_empty() {
            warn!(job_id = %job_id, "No source agents registered");
            setup_errors.push("No source agents configured".to_string());
        }
        let toolkit = match self.backends.toolkit(&request.credentials) {
            Ok(toolkit) => Some(toolkit),
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Backend setup failed, running no agents");
                setup_errors.push(format!("Backend setup failed: {e:#}"));
                None
            }
        };
        let embedder = toolkit.as_ref().and_then(|t| t.embedder.clone());

        advance(slot, Stage::RunningAgents)?;
        let outputs = match toolkit {
            Some(toolkit) => {
                self.fan_out(AgentRequest {
                    company: company.clone(),
                    url: url.clone(),
                    toolkit,
                })
                .await
            }
            None => Vec::new(),
        };

        advance(slot, Stage::Aggregating)?;
        let aggregation = aggregate(&outputs);
        info!(
            job_id = %job_id,
            candidates = aggregation.candidates.len(),
            discarded = aggregation.discarded,
            "Aggregation complete"
        );

        advance(slot, Stage::Deduplicating)?;
        let dedup = Deduplicator::new(embedder, self.settings.dedup)
            .run(aggregation.candidates)
            .await;

        advance(slot, Stage::Summarizing)?;
        let mut report = Report::new(company.as_str(), url.clone());
        report.errors = setup_errors;
        for output in outputs {
            report.messages.extend(output.messages);
            report.errors.extend(output.errors);
        }
        report.messages.extend(dedup.messages);
        report.summary = Summary {
            records_per_source: aggregation.per_source,
            total_locations: dedup.locations.len(),
            url_supplied,
            url_processed: url.is_some(),
        };
        report.locations = dedup.locations;

        advance(slot, Stage::Finalizing)?;
        report.messages.push(format!(
            "Discovery completed for {company} - found {} locations",
            report.locations.len()
        ));
        Ok(report)
    }

    /// One task per agent, each bounded by the agent timeout. A timed-out
    /// task is aborted; a crashed or timed-out agent contributes an error
    /// and no records. Output order is registration order.
    async fn fan_out(&self, request: AgentRequest) -> Vec<AgentOutput> {
        let request = Arc::new(request);
        let budget = self.settings.agent_timeout;

        let tasks = self.agents.iter().map(|agent| {
            let agent = agent.clone();
            let request = request.clone();
            async move {
                let source = agent.source();
                let name = agent.name().to_string();
                let mut handle = tokio::spawn(async move { agent.extract(&request).await });

                match tokio::time::timeout(budget, &mut handle).await {
                    Ok(Ok(output)) => output,
                    Ok(Err(e)) => {
                        error!(agent = name.as_str(), error = %e, "Agent task crashed");
                        AgentOutput::failed(source, format!("{name} crashed: {e}"))
                    }
                    Err(_) => {
                        handle.abort();
                        warn!(agent = name.as_str(), budget = ?budget, "Agent timed out");
                        AgentOutput::failed(source, format!("{name} timed out after {budget:?}"))
                    }
                }
            }
        });

        join_all(tasks).await
    }

    // --- Reads ---

    pub fn get_status(&self, job_id: JobId) -> Result<Job> {
        self.store.get(job_id)
    }

    /// The report of a completed job. Pending and running jobs are
    /// `NotReady`; failed jobs return their failure.
    pub fn get_result(&self, job_id: JobId) -> Result<Report> {
        let job = self.store.get(job_id)?;
        match job.status {
            JobStatus::Completed => job.result.ok_or_else(|| {
                LocusError::JobFailed("completed job is missing its report".to_string())
            }),
            JobStatus::Failed => Err(LocusError::JobFailed(
                job.error.unwrap_or_else(|| "unknown error".to_string()),
            )),
            status => Err(LocusError::NotReady { status }),
        }
    }

    /// Newest first, at most 100.
    pub fn list_jobs(&self, limit: usize) -> Vec<Job> {
        self.store.list(limit.min(MAX_LIST_LIMIT))
    }

    /// Remove a job record. In-flight work is not interrupted.
    pub fn delete(&self, job_id: JobId) -> Result<Job> {
        let job = self.store.remove(job_id)?;
        info!(job_id = %job_id, status = %job.status, "Job deleted");
        Ok(job)
    }

    /// Poll until the job is terminal.
    pub async fn wait(&self, job_id: JobId, interval: Duration) -> Result<Job> {
        loop {
            let job = self.get_status(job_id)?;
            if job.status.is_terminal() {
                return Ok(job);
            }
            tokio::time::sleep(interval).await;
        }
    }
}

fn validate(request: &DiscoveryRequest) -> Result<()> {
    if request.company.trim().is_empty() {
        return Err(LocusError::Validation("company name is required".to_string()));
    }
    Ok(())
}

fn advance(slot: &JobSlot, stage: Stage) -> Result<()> {
    slot.update(|job| job.advance(stage.progress(), stage.message()))
}
