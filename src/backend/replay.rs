//! Replay backend: runs a recorded trace on a virtual clock.
//!
//! Time only advances with the trace.  Before each event, every timeout
//! check due at or before the event's timestamp is delivered at its own
//! deadline; checks still pending after the last event are flushed.

use std::path::Path;

use anyhow::Context;
use tracing::info;

use crate::config::PagerConfig;
use crate::pipeline::GesturePipeline;
use crate::policy::InstrumentMode;
use crate::scheduler::DeadlineQueue;
use crate::sink::{CommandLog, PagerCommand};
use crate::trace::{self, TraceEvent};

use super::TimedCommand;

/// Outcome of a replay.
#[derive(Debug)]
pub struct Replay {
    pub commands: Vec<TimedCommand>,
    pub events: usize,
    /// Final pipeline status.
    pub status: String,
}

fn collect(log: &CommandLog, timestamp_s: f64, out: &mut Vec<TimedCommand>) {
    out.extend(log.drain().into_iter().map(|command| TimedCommand {
        timestamp_s,
        command,
    }));
}

/// Replay `events` through a fresh pipeline.
pub fn replay(events: &[TraceEvent], policy: InstrumentMode, config: &PagerConfig) -> Replay {
    let log = CommandLog::new();
    let queue = DeadlineQueue::new();
    let mut pipeline =
        GesturePipeline::new(policy, config.lifecycle_config(), log.clone(), queue.clone());
    let mut commands = Vec::new();

    for event in events {
        let now = event.timestamp_s();
        for check in queue.take_due(now) {
            pipeline.on_confirmation_deadline(check);
            collect(&log, check.deadline_s, &mut commands);
        }
        event.apply(&mut pipeline);
        collect(&log, now, &mut commands);
    }

    for check in queue.take_due(f64::INFINITY) {
        pipeline.on_confirmation_deadline(check);
        collect(&log, check.deadline_s, &mut commands);
    }

    Replay {
        commands,
        events: events.len(),
        status: pipeline.status_sexp(),
    }
}

/// Replay a trace file and print every emitted command.
pub fn run(path: &Path, config: &PagerConfig) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading trace {}", path.display()))?;
    let events =
        trace::parse_trace(&text).with_context(|| format!("parsing trace {}", path.display()))?;
    let policy = config.load_policy()?;
    info!(
        "Replaying {} event(s) from {} under {} policy",
        events.len(),
        path.display(),
        policy.instrument().as_str()
    );

    let outcome = replay(&events, policy, config);
    for command in &outcome.commands {
        println!("{}", command.to_sexp());
    }
    info!(
        "Replay finished: {} event(s), {} command(s)",
        outcome.events,
        outcome.commands.len()
    );
    info!("Final status: {}", outcome.status);
    Ok(())
}
