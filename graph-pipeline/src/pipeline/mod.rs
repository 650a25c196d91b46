pub mod context;
pub mod services;
pub mod stages;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info, warn};

use common::error::AppError;
use common::storage::store::{ObjectFilter, Store};
use common::storage::types::activity::{ActivityRecord, ActivityStatus};
use common::storage::types::canonical_object::CanonicalObject;
use common::storage::types::experiment::{
    ExperimentResult, ExperimentStatus, Layer, LayerMetricsRecord, NewExperiment,
};
use common::utils::config::ExperimentConfig;

pub use context::{PipelineContext, PipelineStats, RunOptions, StorageStats};
pub use services::PipelineServices;

use self::stages::{
    ChunkingStage, ConsolidationStage, EmbeddingStage, GraphStage, RetrievalStage, StorageStage,
    TemporalStage, ValidationStage,
};

/// One unit of pipeline work. Stages read fields earlier stages populated
/// and write only their own output field plus their stats section.
#[async_trait]
pub trait PipelineStage: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Layer this stage reports metrics under, if any.
    fn layer(&self) -> Option<Layer> {
        None
    }

    fn should_run(&self, ctx: &PipelineContext) -> bool {
        let _ = ctx;
        true
    }

    async fn execute(
        &self,
        ctx: &mut PipelineContext,
        services: &PipelineServices,
    ) -> Result<(), AppError>;
}

type StageStartCallback = Box<dyn Fn(&str) + Send + Sync>;
type StageCompleteCallback = Box<dyn Fn(&str, Duration) + Send + Sync>;
type StageErrorCallback = Box<dyn Fn(&str, &AppError) + Send + Sync>;

/// Lifecycle callbacks observed around every executed stage.
#[derive(Default)]
pub struct PipelineHooks {
    on_stage_start: Option<StageStartCallback>,
    on_stage_complete: Option<StageCompleteCallback>,
    on_stage_error: Option<StageErrorCallback>,
}

impl PipelineHooks {
    pub fn on_stage_start(mut self, callback: StageStartCallback) -> Self {
        self.on_stage_start = Some(callback);
        self
    }

    pub fn on_stage_complete(mut self, callback: StageCompleteCallback) -> Self {
        self.on_stage_complete = Some(callback);
        self
    }

    pub fn on_stage_error(mut self, callback: StageErrorCallback) -> Self {
        self.on_stage_error = Some(callback);
        self
    }
}

/// Structured outcome of one run. Partial stats from completed stages are
/// preserved on failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineResult {
    pub success: bool,
    pub config: ExperimentConfig,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
    pub stats: PipelineStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Write an activity record, swallowing storage errors: the audit log
/// never fails a run.
pub async fn log_activity(store: &dyn Store, record: ActivityRecord) {
    if let Err(err) = store.insert_activity_log(record).await {
        warn!(error = %err, "failed to write activity log record");
    }
}

/// Threads a shared context through an ordered stage list with skip
/// predicates, lifecycle hooks, durable activity logging and experiment
/// bookkeeping.
pub struct PipelineRunner {
    config: ExperimentConfig,
    store: Arc<dyn Store>,
    services: PipelineServices,
    stages: Vec<Arc<dyn PipelineStage>>,
    hooks: PipelineHooks,
    options: RunOptions,
}

impl PipelineRunner {
    pub fn new(
        config: ExperimentConfig,
        store: Arc<dyn Store>,
        services: PipelineServices,
    ) -> Result<Self, AppError> {
        config.validate()?;
        Ok(Self {
            config,
            store,
            services,
            stages: default_stages(),
            hooks: PipelineHooks::default(),
            options: RunOptions::default(),
        })
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_hooks(mut self, hooks: PipelineHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Insert a stage at `index`, or append when `index` is `None` or past
    /// the end.
    pub fn add_stage(&mut self, stage: Arc<dyn PipelineStage>, index: Option<usize>) {
        match index {
            Some(index) if index < self.stages.len() => self.stages.insert(index, stage),
            _ => self.stages.push(stage),
        }
    }

    /// Remove the first stage with this name; returns whether one existed.
    pub fn remove_stage(&mut self, name: &str) -> bool {
        let before = self.stages.len();
        self.stages.retain(|stage| stage.name() != name);
        self.stages.len() != before
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Run the pipeline over `objects`, or over the store's full corpus
    /// when none are supplied.
    pub async fn run(&self, objects: Option<Vec<CanonicalObject>>) -> PipelineResult {
        let started = Instant::now();
        let timestamp = Utc::now();

        let objects = match objects {
            Some(objects) => objects,
            None => match self
                .store
                .search_canonical_objects(&ObjectFilter::default(), None)
                .await
            {
                Ok(objects) => objects,
                Err(err) => {
                    return self
                        .failure(PipelineStats::default(), started, timestamp, None, err)
                        .await;
                }
            },
        };

        if objects.is_empty() {
            let err = AppError::Input("pipeline invoked with no canonical objects".into());
            return self
                .failure(PipelineStats::default(), started, timestamp, None, err)
                .await;
        }

        let mut ctx = PipelineContext::new(
            self.config.clone(),
            self.options.clone(),
            objects,
            Arc::clone(&self.store),
        );

        if self.config.validation.auto_save_experiment {
            match self.upsert_running_experiment().await {
                Ok(id) => ctx.experiment_id = Some(id),
                Err(err) => {
                    return self
                        .failure(ctx.stats, started, timestamp, None, err)
                        .await;
                }
            }
        }

        info!(
            experiment = %self.config.name,
            objects = ctx.objects.len(),
            stages = self.stages.len(),
            "pipeline run starting"
        );

        for stage in &self.stages {
            if self.cancelled() {
                let err = AppError::Internal("cancelled".into());
                return self
                    .failure(ctx.stats, started, timestamp, ctx.experiment_id, err)
                    .await;
            }

            if !stage.should_run(&ctx) {
                debug!(stage = stage.name(), "stage skipped");
                continue;
            }

            if let Some(callback) = &self.hooks.on_stage_start {
                callback(stage.name());
            }

            let stage_started = Instant::now();
            let outcome = self.execute_stage(stage.as_ref(), &mut ctx).await;
            let stage_duration = stage_started.elapsed();

            match outcome {
                Ok(()) => {
                    if let Some(callback) = &self.hooks.on_stage_complete {
                        callback(stage.name(), stage_duration);
                    }
                    debug!(
                        stage = stage.name(),
                        duration_ms = duration_millis(stage_duration),
                        "stage completed"
                    );

                    if let Err(err) = self
                        .record_layer_metrics(&ctx, stage.as_ref(), stage_duration)
                        .await
                    {
                        if let Some(callback) = &self.hooks.on_stage_error {
                            callback(stage.name(), &err);
                        }
                        return self
                            .failure(ctx.stats, started, timestamp, ctx.experiment_id, err)
                            .await;
                    }
                }
                Err(err) => {
                    if let Some(callback) = &self.hooks.on_stage_error {
                        callback(stage.name(), &err);
                    }
                    error!(stage = stage.name(), error = %err, "stage failed");
                    return self
                        .failure(ctx.stats, started, timestamp, ctx.experiment_id, err)
                        .await;
                }
            }
        }

        if let Err(err) = self.finalize_experiment(&ctx).await {
            return self
                .failure(ctx.stats, started, timestamp, ctx.experiment_id, err)
                .await;
        }

        let duration = started.elapsed();
        log_activity(
            self.store.as_ref(),
            ActivityRecord::new(
                "pipeline",
                "full_pipeline",
                format!("Completed pipeline run for '{}'", self.config.name),
                ActivityStatus::Completed,
                self.options.triggered_by(),
            )
            .with_details(json!({
                "objects": ctx.objects.len(),
                "chunks": ctx.chunks.len(),
                "duration_ms": duration_millis(duration),
            }))
            .with_experiment_id(ctx.experiment_id.clone())
            .with_git_commit(self.config.metadata.git_commit.clone()),
        )
        .await;

        info!(
            experiment = %self.config.name,
            duration_ms = duration_millis(duration),
            "pipeline run completed"
        );

        PipelineResult {
            success: true,
            config: self.config.clone(),
            duration_ms: duration_millis(duration),
            timestamp,
            stats: ctx.stats,
            error: None,
        }
    }

    async fn execute_stage(
        &self,
        stage: &dyn PipelineStage,
        ctx: &mut PipelineContext,
    ) -> Result<(), AppError> {
        match self.options.stage_timeout {
            Some(timeout) => {
                match tokio::time::timeout(timeout, stage.execute(ctx, &self.services)).await {
                    Ok(result) => result,
                    Err(_) => Err(AppError::Internal(format!(
                        "stage {} timed out after {}ms",
                        stage.name(),
                        duration_millis(timeout)
                    ))),
                }
            }
            None => stage.execute(ctx, &self.services).await,
        }
    }

    fn cancelled(&self) -> bool {
        self.options
            .cancellation
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    async fn upsert_running_experiment(&self) -> Result<String, AppError> {
        self.store
            .upsert_experiment(NewExperiment {
                name: self.config.name.clone(),
                description: self.config.description.clone(),
                config_json: serde_json::to_value(&self.config)?,
                is_baseline: self.config.metadata.baseline,
                paper_ids: self.config.metadata.paper_ids.clone(),
                git_commit: self.config.metadata.git_commit.clone(),
                status: ExperimentStatus::Running,
            })
            .await
    }

    async fn record_layer_metrics(
        &self,
        ctx: &PipelineContext,
        stage: &dyn PipelineStage,
        duration: Duration,
    ) -> Result<(), AppError> {
        let (Some(experiment_id), Some(layer)) = (&ctx.experiment_id, stage.layer()) else {
            return Ok(());
        };
        let Some(metrics_json) = ctx.stats.layer_json(layer) else {
            return Ok(());
        };
        self.store
            .upsert_layer_metrics(LayerMetricsRecord {
                experiment_id: experiment_id.clone(),
                layer,
                evaluation_method: "pipeline".to_string(),
                metrics_json,
                duration_ms: duration_millis(duration),
            })
            .await
    }

    async fn finalize_experiment(&self, ctx: &PipelineContext) -> Result<(), AppError> {
        let Some(experiment_id) = &ctx.experiment_id else {
            return Ok(());
        };

        if let Some(reports) = &ctx.stats.validation {
            let retrieval_time_ms = ctx
                .stats
                .retrieval
                .as_ref()
                .map(|report| report.avg_retrieval_time_ms);
            for (scenario, report) in reports {
                self.store
                    .upsert_experiment_result(ExperimentResult {
                        experiment_id: experiment_id.clone(),
                        scenario: scenario.clone(),
                        f1: report.f1,
                        precision: report.precision,
                        recall: report.recall,
                        tp: report.tp,
                        fp: report.fp,
                        false_negatives: report.false_negatives,
                        ground_truth_total: report.ground_truth_total,
                        inferred_total: report.inferred_total,
                        retrieval_time_ms,
                    })
                    .await?;
            }
        }

        self.store
            .update_experiment_status(experiment_id, ExperimentStatus::Completed, Some(Utc::now()))
            .await
    }

    async fn failure(
        &self,
        stats: PipelineStats,
        started: Instant,
        timestamp: DateTime<Utc>,
        experiment_id: Option<String>,
        err: AppError,
    ) -> PipelineResult {
        let duration = started.elapsed();
        error!(
            experiment = %self.config.name,
            error = %err,
            duration_ms = duration_millis(duration),
            "pipeline run failed"
        );

        log_activity(
            self.store.as_ref(),
            ActivityRecord::new(
                "pipeline",
                "full_pipeline",
                format!("Pipeline run for '{}' failed: {err}", self.config.name),
                ActivityStatus::Failed,
                self.options.triggered_by(),
            )
            .with_details(json!({
                "error": err.to_string(),
                "duration_ms": duration_millis(duration),
            }))
            .with_experiment_id(experiment_id.clone()),
        )
        .await;

        if let Some(experiment_id) = &experiment_id {
            if let Err(status_err) = self
                .store
                .update_experiment_status(experiment_id, ExperimentStatus::Failed, Some(Utc::now()))
                .await
            {
                warn!(error = %status_err, "failed to mark experiment as failed");
            }
        }

        PipelineResult {
            success: false,
            config: self.config.clone(),
            duration_ms: duration_millis(duration),
            timestamp,
            stats,
            error: Some(err.to_string()),
        }
    }
}

/// Chunking → Embedding → Storage → Retrieval → Validation → Graph →
/// Temporal → Consolidation. Bracketed stages drop out via `should_run`.
fn default_stages() -> Vec<Arc<dyn PipelineStage>> {
    vec![
        Arc::new(ChunkingStage),
        Arc::new(EmbeddingStage),
        Arc::new(StorageStage),
        Arc::new(RetrievalStage),
        Arc::new(ValidationStage),
        Arc::new(GraphStage),
        Arc::new(TemporalStage),
        Arc::new(ConsolidationStage),
    ]
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
