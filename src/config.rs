//! Runtime configuration and policy-file persistence.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::info;

use crate::gesture::LifecycleConfig;
use crate::policy::{Instrument, InstrumentMode};

/// Pager configuration assembled from the command line.
#[derive(Debug, Clone)]
pub struct PagerConfig {
    /// Secondary-gesture sensitivity (0.0 conservative, 1.0 permissive).
    pub sensitivity: f64,
    /// Minimum activation length before a secondary gesture triggers (seconds).
    pub min_gesture_duration_s: f64,
    /// Minimum producer confidence for a secondary reading.
    pub min_confidence: f64,
    /// Instrument whose default policy applies when no file overrides it.
    pub instrument: Instrument,
    /// Policy file (s-expression plist) overriding the instrument default.
    pub policy_file: Option<PathBuf>,
    /// Live-mode event loop poll interval in milliseconds.
    pub poll_interval_ms: u64,
    /// Live-mode status log interval in seconds.
    pub status_interval_s: u64,
}

impl Default for PagerConfig {
    fn default() -> Self {
        Self {
            sensitivity: 0.5,
            min_gesture_duration_s: 0.15,
            min_confidence: 0.5,
            instrument: Instrument::Piano,
            policy_file: None,
            poll_interval_ms: 50,
            status_interval_s: 60,
        }
    }
}

impl PagerConfig {
    pub fn lifecycle_config(&self) -> LifecycleConfig {
        LifecycleConfig {
            sensitivity: self.sensitivity,
            min_gesture_duration_s: self.min_gesture_duration_s,
            min_confidence: self.min_confidence,
            ..LifecycleConfig::default()
        }
    }

    /// The policy to start with: the policy file if one is configured and
    /// present, otherwise the instrument default.
    pub fn load_policy(&self) -> anyhow::Result<InstrumentMode> {
        match &self.policy_file {
            Some(path) if path.exists() => load_policy_file(path, self.instrument),
            Some(path) => {
                info!(
                    "Policy file {} not found, using {} default",
                    path.display(),
                    self.instrument.as_str()
                );
                Ok(InstrumentMode::for_instrument(self.instrument))
            }
            None => Ok(InstrumentMode::for_instrument(self.instrument)),
        }
    }
}

/// Read and validate a policy file.  Keys absent from the file keep the
/// default of `fallback` (or of the file's own `:instrument`).
pub fn load_policy_file(path: &Path, fallback: Instrument) -> anyhow::Result<InstrumentMode> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading policy file {}", path.display()))?;
    let policy = InstrumentMode::from_sexp(&raw, fallback)
        .with_context(|| format!("parsing policy file {}", path.display()))?;
    info!(
        "Loaded {} policy from {}",
        policy.instrument().as_str(),
        path.display()
    );
    Ok(policy)
}

/// Write a policy file.
pub fn save_policy_file(path: &Path, policy: &InstrumentMode) -> anyhow::Result<()> {
    std::fs::write(path, format!("{}\n", policy.to_sexp()))
        .with_context(|| format!("writing policy file {}", path.display()))?;
    info!("Saved {} policy to {}", policy.instrument().as_str(), path.display());
    Ok(())
}

/// Remove a policy file so the instrument default applies again.
/// A missing file is not an error.
pub fn clear_policy_file(path: &Path) -> anyhow::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            info!("Cleared policy file {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("removing policy file {}", path.display())),
    }
}
