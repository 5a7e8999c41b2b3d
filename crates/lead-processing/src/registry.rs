//! Model promotion and readiness wait.
//!
//! The registry itself lives elsewhere; this module only needs the three
//! operations in [`ModelRegistry`]. Waiting goes through a [`Clock`] so
//! tests never sleep, and is bounded by [`WaitPolicy::max_attempts`].

use crate::error::{PipelineError, Result};
use crate::pipeline::CancellationToken;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Stage a freshly trained model is promoted to by default.
pub const DEFAULT_STAGE: &str = "Staging";

/// The subset of a model registry used for promotion.
pub trait ModelRegistry: Send + Sync {
    /// Highest registered version of a model, if any.
    fn latest_version(&self, model_name: &str) -> Result<Option<u64>>;

    /// Current stage of a model version.
    fn current_stage(&self, model_name: &str, version: u64) -> Result<String>;

    /// Request a stage transition. The registry may apply it asynchronously.
    fn transition_stage(
        &self,
        model_name: &str,
        version: u64,
        stage: &str,
        archive_existing: bool,
    ) -> Result<()>;
}

/// Source of waiting between polls.
pub trait Clock: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Wall-clock [`Clock`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// How often and how many times to poll for the target stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_attempts: 30,
        }
    }
}

/// Which model version to promote, and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionRequest {
    pub model_name: String,
    /// Latest registered version when `None`.
    pub version: Option<u64>,
    pub stage: String,
    #[serde(default)]
    pub wait: WaitPolicy,
}

impl PromotionRequest {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            version: None,
            stage: DEFAULT_STAGE.to_string(),
            wait: WaitPolicy::default(),
        }
    }

    pub fn version(mut self, version: u64) -> Self {
        self.version = Some(version);
        self
    }

    pub fn stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = stage.into();
        self
    }

    pub fn wait(mut self, wait: WaitPolicy) -> Self {
        self.wait = wait;
        self
    }
}

/// Outcome of a successful promotion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentStatus {
    pub model_name: String,
    pub version: u64,
    pub stage: String,
    /// The version was already in the target stage; no transition was made.
    pub already_in_stage: bool,
}

/// Promote a model version and wait until the registry reports the target
/// stage.
///
/// Existing versions in the target stage are archived by the transition.
/// Fails with [`PipelineError::NoModelVersions`] when no version is given and
/// none is registered, [`PipelineError::DeploymentTimeout`] when the stage is
/// not reached within the policy, and [`PipelineError::Cancelled`] when the
/// token is cancelled between polls.
pub fn promote_model(
    registry: &dyn ModelRegistry,
    request: &PromotionRequest,
    clock: &dyn Clock,
    token: &CancellationToken,
) -> Result<DeploymentStatus> {
    let name = request.model_name.as_str();
    let version = match request.version {
        Some(v) => v,
        None => registry
            .latest_version(name)?
            .ok_or_else(|| PipelineError::NoModelVersions(name.to_string()))?,
    };

    let status = |already_in_stage| DeploymentStatus {
        model_name: name.to_string(),
        version,
        stage: request.stage.clone(),
        already_in_stage,
    };

    let current = registry.current_stage(name, version)?;
    if current == request.stage {
        info!("Model '{}' v{} is already in '{}'", name, version, request.stage);
        return Ok(status(true));
    }

    info!(
        "Transitioning model '{}' v{} from '{}' to '{}'",
        name, version, current, request.stage
    );
    registry.transition_stage(name, version, &request.stage, true)?;

    for attempt in 1..=request.wait.max_attempts {
        if token.is_cancelled() {
            warn!("Promotion of '{}' v{} cancelled", name, version);
            return Err(PipelineError::Cancelled);
        }
        let stage = registry.current_stage(name, version)?;
        if stage == request.stage {
            info!(
                "Model '{}' v{} reached '{}' after {} checks",
                name, version, request.stage, attempt
            );
            return Ok(status(false));
        }
        debug!(
            "Model '{}' v{} still in '{}' (check {}/{})",
            name, version, stage, attempt, request.wait.max_attempts
        );
        if attempt < request.wait.max_attempts {
            clock.sleep(request.wait.interval);
        }
    }

    Err(PipelineError::DeploymentTimeout {
        model: name.to_string(),
        version,
        stage: request.stage.clone(),
        attempts: request.wait.max_attempts,
    })
}
