//! Runtime backends: trace replay on a virtual clock, and live stdin input.

pub mod live;
pub mod replay;

use std::path::PathBuf;

use crate::config::PagerConfig;
use crate::sink::PagerCommand;

/// Backend selector.
#[derive(Debug, Clone)]
pub enum BackendType {
    Replay(PathBuf),
    Live,
}

/// A command and the time it was emitted at.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedCommand {
    pub timestamp_s: f64,
    pub command: PagerCommand,
}

impl TimedCommand {
    pub fn to_sexp(&self) -> String {
        format!("(:at {:.3} :command {})", self.timestamp_s, self.command.to_sexp())
    }
}

/// Run the pager with the selected backend.
pub fn run(backend: BackendType, config: &PagerConfig) -> anyhow::Result<()> {
    match backend {
        BackendType::Replay(path) => replay::run(&path, config),
        BackendType::Live => live::run(config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timed_command_sexp() {
        let c = TimedCommand {
            timestamp_s: 1.5,
            command: PagerCommand::ConfirmationExpired,
        };
        assert_eq!(
            c.to_sexp(),
            "(:at 1.500 :command (:type :event :event :confirmation-expired))"
        );
    }
}
