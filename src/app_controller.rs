/*!
 * Application controller: wires configuration, subtitle files, endpoint pools
 * and the dispatcher into the translate-a-file flow used by the CLI.
 */

use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::app_config::{Config, PoolRole};
use crate::errors::AppError;
use crate::pool::EndpointPool;
use crate::progress::ProgressSender;
use crate::session::{SessionOutcome, SessionReport, SessionSnapshot};
use crate::subtitle_processor::SubtitleCollection;
use crate::translation::{CancelHandle, DispatchOptions, Dispatcher};

/// Main application controller
pub struct Controller {
    config: Config,
    dispatcher: Dispatcher,
}

impl Controller {
    /// Create a controller from a validated configuration.
    ///
    /// Pools are acquired here, at session start, and live for the
    /// controller's lifetime; nothing looks credentials up ambiently later.
    pub fn new(config: Config, progress: ProgressSender) -> Result<Self, AppError> {
        config.validate()?;
        let primary = Arc::new(EndpointPool::from_config(&config, PoolRole::Primary));
        let fallback = Arc::new(EndpointPool::from_config(&config, PoolRole::Fallback));
        let dispatcher = Dispatcher::new(
            primary,
            fallback,
            config.name_map.clone(),
            DispatchOptions::from(&config.settings),
        )
        .with_progress(progress);
        Ok(Self { config, dispatcher })
    }

    /// Handle for canceling an in-flight run from another task
    pub fn cancel_handle(&self) -> CancelHandle {
        self.dispatcher.cancel_handle()
    }

    /// Default snapshot location for an input file
    pub fn snapshot_path_for(input: &Path) -> PathBuf {
        let mut name = input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "session".to_string());
        name.push_str(".subfall.json");
        input.with_file_name(name)
    }

    /// Translate one subtitle file end to end.
    ///
    /// Parses the input, optionally seeds the run from a resume snapshot,
    /// dispatches, writes the translated SRT, and persists the session
    /// snapshot next to the input for later resumes.
    pub async fn translate_file(
        &self,
        input: &Path,
        output: &Path,
        resume_from: Option<&Path>,
    ) -> Result<SessionReport, AppError> {
        let collection = SubtitleCollection::from_file(input)?;
        let lines = collection.to_lines();
        info!(
            "Loaded {} subtitle entries from {}",
            lines.len(),
            input.display()
        );

        let snapshot = match resume_from {
            Some(path) => {
                let snapshot = SessionSnapshot::load(path)?;
                if !snapshot.matches(lines.len(), self.config.settings.chunk_size) {
                    warn!(
                        "Snapshot {} does not match this input (lines or chunk size differ), ignoring",
                        path.display()
                    );
                    None
                } else {
                    info!("Resuming from snapshot {}", path.display());
                    Some(snapshot)
                }
            }
            None => None,
        };

        let report = self.dispatcher.run(&lines, snapshot.as_ref()).await?;

        collection
            .with_outcomes(&report.outcomes)?
            .write_to_file(output)?;
        info!("Wrote translated subtitles to {}", output.display());

        let snapshot_path = Self::snapshot_path_for(input);
        if let Err(e) = report.snapshot.save(&snapshot_path) {
            warn!("Could not save session snapshot: {}", e);
        } else if report.outcome == SessionOutcome::Canceled {
            info!(
                "Session canceled; resume later with --resume {}",
                snapshot_path.display()
            );
        }

        Ok(report)
    }
}
