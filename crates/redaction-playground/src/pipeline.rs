//! The detect-and-redact pipeline.
//!
//! A [`Playground`] owns the loaded detector, the optional remote assist
//! client and the "latest result" slot shown to the user. Each call to
//! [`Playground::run_redaction`] runs local detection, optionally remote
//! assist, then merges and renders.
//!
//! Runs are tagged with a monotonically increasing id. A run that completes
//! after a newer run was started still returns its result to its caller, but
//! never overwrites the latest slot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::assist::{AssistClient, AssistErrorKind, RemoteAssist, UsageInfo};
use crate::config::{Config, DEFAULT_MAX_INPUT_CHARS};
use crate::detection::{Detection, Origin};
use crate::detector::{DetectorOptions, LocalDetector};
use crate::error::{Error, Result};
use crate::loader::DetectorLoader;
use crate::merge::{merge_detections, OverlapPolicy};
use crate::render::render_redaction;
use crate::text::{utf16_len, TextIndex};

/// Per-run options supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Call remote assist after local detection.
    pub use_assist: bool,
    /// API key for remote assist; blank means anonymous.
    pub api_key: Option<String>,
}

impl RunOptions {
    /// Local detection only.
    #[must_use]
    pub fn local() -> Self {
        Self::default()
    }

    /// Local detection plus remote assist.
    #[must_use]
    pub fn with_assist(api_key: Option<String>) -> Self {
        Self {
            use_assist: true,
            api_key,
        }
    }
}

/// What happened to the remote assist pass of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AssistOutcome {
    /// Remote assist was not requested.
    Skipped,
    /// Remote assist answered; `added` of `received` detections were new.
    Applied {
        /// Detections returned by the endpoint.
        received: usize,
        /// Detections that survived the merge as remote additions.
        added: usize,
    },
    /// Remote assist was unavailable; the run used local detections only.
    Degraded {
        /// User-facing explanation.
        message: String,
    },
    /// Remote assist refused the request; local detections are still shown.
    Rejected {
        /// Why the request was refused.
        kind: AssistErrorKind,
        /// User-facing explanation with the suggested fix.
        message: String,
    },
}

impl AssistOutcome {
    /// Check if the outcome should be shown to the user as a problem.
    #[must_use]
    pub fn is_problem(&self) -> bool {
        matches!(self, Self::Degraded { .. } | Self::Rejected { .. })
    }
}

/// The outcome of one detect-and-redact run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedactionResult {
    /// Sequence number of the run.
    pub run_id: u64,
    /// The input with every detection replaced.
    pub redacted_text: String,
    /// Merged detections, ordered by start.
    pub detections: Vec<Detection>,
    /// Quota usage from the remote call, if one was made and reported it.
    pub usage: Option<UsageInfo>,
    /// Remote assist outcome.
    pub assist: AssistOutcome,
    /// Non-fatal problems, in user-facing wording.
    pub warnings: Vec<String>,
}

impl RedactionResult {
    /// Check if any warnings were raised.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Pipeline settings independent of the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Longest input accepted, in UTF-16 units.
    pub max_input_chars: usize,
    /// Merge policy for overlapping spans.
    pub overlap_policy: OverlapPolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            overlap_policy: OverlapPolicy::default(),
        }
    }
}

impl From<&Config> for PipelineSettings {
    fn from(config: &Config) -> Self {
        Self {
            max_input_chars: config.limits.max_input_chars,
            overlap_policy: config.detector.overlap_policy,
        }
    }
}

#[derive(Debug)]
struct ActiveDetector {
    options: DetectorOptions,
    local: LocalDetector,
}

#[derive(Debug, Default)]
struct Latest {
    result: Option<RedactionResult>,
    usage: Option<UsageInfo>,
}

/// The detect-and-redact core.
#[derive(Debug)]
pub struct Playground {
    loader: Option<DetectorLoader>,
    active: RwLock<ActiveDetector>,
    remote: Option<Arc<dyn RemoteAssist>>,
    settings: PipelineSettings,
    generation: AtomicU64,
    latest: Mutex<Latest>,
}

impl Playground {
    /// Build a playground from configuration.
    ///
    /// Loads the configured pattern pack and sets up the assist client.
    ///
    /// # Errors
    ///
    /// Returns an error if the pack cannot be loaded or an HTTP client cannot
    /// be built.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.assist.timeout())
            .build()?;
        let loader = DetectorLoader::with_client(config.detector.source.clone(), http);
        let remote: Arc<dyn RemoteAssist> = Arc::new(AssistClient::from_config(&config.assist)?);

        Self::load(
            loader,
            config.detector.detector_options(),
            Some(remote),
            PipelineSettings::from(config),
        )
        .await
    }

    /// Build a playground whose detector comes from `loader`.
    ///
    /// # Errors
    ///
    /// Returns an error if the pack cannot be loaded.
    pub async fn load(
        loader: DetectorLoader,
        options: DetectorOptions,
        remote: Option<Arc<dyn RemoteAssist>>,
        settings: PipelineSettings,
    ) -> Result<Self> {
        let factory = loader.load().await?;
        let local = LocalDetector::new(factory.configure(options));
        Ok(Self {
            loader: Some(loader),
            active: RwLock::new(ActiveDetector { options, local }),
            remote,
            settings,
            generation: AtomicU64::new(0),
            latest: Mutex::new(Latest::default()),
        })
    }

    /// Build a playground around an already instantiated detector.
    ///
    /// Without a loader, [`Playground::set_options`] and
    /// [`Playground::reload`] are unavailable; use
    /// [`Playground::replace_detector`] instead.
    #[must_use]
    pub fn with_detector(
        local: LocalDetector,
        remote: Option<Arc<dyn RemoteAssist>>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            loader: None,
            active: RwLock::new(ActiveDetector {
                options: DetectorOptions::default(),
                local,
            }),
            remote,
            settings,
            generation: AtomicU64::new(0),
            latest: Mutex::new(Latest::default()),
        }
    }

    /// The pipeline settings.
    #[must_use]
    pub fn settings(&self) -> PipelineSettings {
        self.settings
    }

    /// The options the active detector was instantiated with.
    pub async fn options(&self) -> DetectorOptions {
        self.active.read().await.options
    }

    /// Re-instantiate the detector with new options.
    ///
    /// The pack source is not fetched again if it is cached. Runs already in
    /// flight keep the detector they started with.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no loader or the pack cannot be loaded.
    pub async fn set_options(&self, options: DetectorOptions) -> Result<()> {
        let factory = self.require_loader()?.load().await?;
        self.install(options, LocalDetector::new(factory.configure(options)))
            .await;
        Ok(())
    }

    /// Drop the cached pack source, fetch it again, and re-instantiate.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no loader or the pack cannot be loaded.
    /// The active detector is kept on failure.
    pub async fn reload(&self) -> Result<()> {
        let factory = self.require_loader()?.reload().await?;
        let options = self.options().await;
        self.install(options, LocalDetector::new(factory.configure(options)))
            .await;
        Ok(())
    }

    /// Swap in a different detector instance.
    pub async fn replace_detector(&self, local: LocalDetector) {
        let options = self.options().await;
        self.install(options, local).await;
    }

    async fn install(&self, options: DetectorOptions, local: LocalDetector) {
        info!(detector = %local.name(), "Detector instantiated");
        *self.active.write().await = ActiveDetector { options, local };
    }

    fn require_loader(&self) -> Result<&DetectorLoader> {
        self.loader
            .as_ref()
            .ok_or_else(|| Error::internal("no detection source configured"))
    }

    /// Run detection and redaction over `text`.
    ///
    /// Local detection always runs first. Remote assist, when requested, can
    /// only add detections. Remote failures never fail the run: they are
    /// reported in [`RedactionResult::assist`] and
    /// [`RedactionResult::warnings`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InputTooLarge`] for oversized input and
    /// [`Error::Detection`] if local detection fails.
    pub async fn run_redaction(&self, text: &str, options: &RunOptions) -> Result<RedactionResult> {
        let run_id = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let start = Instant::now();

        let len = utf16_len(text);
        if len > self.settings.max_input_chars {
            warn!(
                run_id,
                len,
                max = self.settings.max_input_chars,
                "Input rejected"
            );
            return Err(Error::InputTooLarge {
                len,
                max: self.settings.max_input_chars,
            });
        }

        let local_detector = self.active.read().await.local.clone();
        let local = local_detector.detect(text).await.inspect_err(|e| {
            warn!(run_id, error = %e, "Local detection failed");
        })?;
        let local_count = local.len();

        let index = TextIndex::new(text);
        let mut warnings = Vec::new();
        let (remote, usage, mut assist) = if options.use_assist {
            self.assist(text, options.api_key.as_deref(), &index, &mut warnings)
                .await
        } else {
            (Vec::new(), None, AssistOutcome::Skipped)
        };

        let detections = merge_detections(local, remote, &index, self.settings.overlap_policy);
        if let AssistOutcome::Applied { added, .. } = &mut assist {
            *added = detections
                .iter()
                .filter(|d| d.origin == Origin::Remote)
                .count();
        }
        let redacted_text = render_redaction(text, &detections);

        let result = RedactionResult {
            run_id,
            redacted_text,
            detections,
            usage,
            assist,
            warnings,
        };

        info!(
            run_id,
            local = local_count,
            merged = result.detections.len(),
            assist = ?result.assist,
            duration_ms = start.elapsed().as_millis(),
            "Redaction run complete"
        );

        self.publish(&result).await;
        Ok(result)
    }

    async fn assist(
        &self,
        text: &str,
        api_key: Option<&str>,
        index: &TextIndex<'_>,
        warnings: &mut Vec<String>,
    ) -> (Vec<Detection>, Option<UsageInfo>, AssistOutcome) {
        let Some(remote) = &self.remote else {
            let message = "AI assist is not configured; showing local detections only.".to_string();
            warnings.push(message.clone());
            return (Vec::new(), None, AssistOutcome::Degraded { message });
        };

        match remote.detect(text, api_key).await {
            Ok(response) => {
                let (detections, rejected) = response.payload.to_detections(index);
                if rejected > 0 {
                    warnings.push(format!(
                        "{rejected} AI assist result(s) could not be read and were skipped."
                    ));
                }
                let outcome = AssistOutcome::Applied {
                    received: detections.len(),
                    added: 0,
                };
                (detections, response.usage, outcome)
            }
            Err(e) if e.is_terminal() => {
                warn!(kind = ?e.kind(), "Assist rejected the request");
                let message = e.user_message();
                warnings.push(message.clone());
                let outcome = AssistOutcome::Rejected {
                    kind: e.kind(),
                    message,
                };
                (Vec::new(), None, outcome)
            }
            Err(e) => {
                warn!(error = %e, "Assist unavailable, continuing with local detections");
                let message = e.user_message();
                warnings.push(message.clone());
                (Vec::new(), None, AssistOutcome::Degraded { message })
            }
        }
    }

    /// Store `result` as the latest unless a newer run has started.
    async fn publish(&self, result: &RedactionResult) {
        let mut latest = self.latest.lock().await;
        if !self.is_current(result.run_id) {
            debug!(run_id = result.run_id, "Discarding superseded run");
            return;
        }
        latest.usage.clone_from(&result.usage);
        latest.result = Some(result.clone());
    }

    /// Check if `run_id` is the most recently started run.
    #[must_use]
    pub fn is_current(&self, run_id: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == run_id
    }

    /// The result of the most recent run that was not superseded.
    pub async fn latest(&self) -> Option<RedactionResult> {
        self.latest.lock().await.result.clone()
    }

    /// Usage reported by the latest published run, if it called remote.
    pub async fn usage(&self) -> Option<UsageInfo> {
        self.latest.lock().await.usage.clone()
    }
}
