//! Live backend: frames from stdin, processed on a dedicated thread,
//! commands delivered on the main thread.
//!
//! ```text
//!   producer thread      processing thread          main thread
//!   stdin lines  ──ch──▶ EventLoop<ProcessingState> ──ch──▶ EventLoop<DeliveryState>
//!                        (pipeline + timeout timers)        (prints commands)
//! ```
//!
//! Frames are stamped with wall-clock time on arrival.  Confirmation
//! timeouts are calloop timers on the processing loop, so they run in the
//! same context as every other pipeline mutation.

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use calloop::channel::{self, Channel, Event};
use calloop::timer::{TimeoutAction, Timer};
use calloop::{EventLoop, LoopHandle};
use tracing::{debug, info, warn};

use crate::config::PagerConfig;
use crate::coordinator::CoordinatorState;
use crate::pipeline::GesturePipeline;
use crate::policy::InstrumentMode;
use crate::scheduler::{TimeoutCheck, TimeoutScheduler};
use crate::sink::{CommandSink, PagerCommand};
use crate::trace::{self, TraceEvent};

use super::TimedCommand;

/// How long past its deadline a pending confirmation may stay unresolved
/// once input has ended before processing stops anyway.
const DRAIN_GRACE_S: f64 = 1.0;

/// Global flag set by SIGTERM/SIGINT handlers.
static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Install signal handlers for graceful shutdown (SIGTERM, SIGINT).
fn install_signal_handlers() {
    unsafe {
        libc::signal(libc::SIGTERM, signal_handler as libc::sighandler_t);
        libc::signal(libc::SIGINT, signal_handler as libc::sighandler_t);
    }
}

extern "C" fn signal_handler(_sig: libc::c_int) {
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
}

fn shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::SeqCst)
}

// ── Clock ───────────────────────────────────────────────────

/// Seconds since session start, shared by every thread.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    start: Instant,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn now_s(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// Wall-clock instant for a session timestamp.  Timestamps before the
    /// start (or non-finite) map to the start.
    pub fn instant_at(&self, timestamp_s: f64) -> Instant {
        self.start + Duration::try_from_secs_f64(timestamp_s).unwrap_or(Duration::ZERO)
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

// ── Processing context ──────────────────────────────────────

/// State owned by the processing event loop.
pub struct ProcessingState {
    pub pipeline: GesturePipeline,
    pub running: bool,
    pub events: u64,
}

/// Schedules timeout checks as one-shot timers on the processing loop.
pub struct CalloopScheduler {
    handle: LoopHandle<'static, ProcessingState>,
    clock: Clock,
}

impl CalloopScheduler {
    pub fn new(handle: LoopHandle<'static, ProcessingState>, clock: Clock) -> Self {
        Self { handle, clock }
    }
}

impl TimeoutScheduler for CalloopScheduler {
    fn schedule(&mut self, check: TimeoutCheck) {
        let timer = Timer::from_deadline(self.clock.instant_at(check.deadline_s));
        let inserted = self
            .handle
            .insert_source(timer, move |_, _, state: &mut ProcessingState| {
                state.pipeline.on_confirmation_deadline(check);
                TimeoutAction::Drop
            });
        if let Err(e) = inserted {
            warn!(
                "Failed to schedule confirmation timeout {}: {}",
                check.session, e.error
            );
        }
    }
}

/// Whether processing may stop after input has ended: nothing is pending,
/// or the pending deadline is long past (its timer was lost).
fn drained(state: &ProcessingState, clock: &Clock) -> bool {
    match state.pipeline.coordinator().state() {
        CoordinatorState::Ready => true,
        CoordinatorState::AwaitingConfirmation {
            session,
            deadline_s,
            ..
        } => {
            let overdue = clock.now_s() > deadline_s + DRAIN_GRACE_S;
            if overdue {
                warn!("Confirmation {} never expired, stopping anyway", session);
            }
            overdue
        }
    }
}

/// Run the processing loop until the frame channel closes or shutdown is
/// requested.  After the channel closes, a pending confirmation is left to
/// expire on its timer first.  Returns the final pipeline status.
pub fn run_processing(
    frames: Channel<TraceEvent>,
    sink: impl CommandSink + 'static,
    policy: InstrumentMode,
    config: &PagerConfig,
    clock: Clock,
) -> anyhow::Result<String> {
    let mut event_loop = EventLoop::<'static, ProcessingState>::try_new()
        .context("creating processing event loop")?;
    let scheduler = CalloopScheduler::new(event_loop.handle(), clock);
    let mut state = ProcessingState {
        pipeline: GesturePipeline::new(policy, config.lifecycle_config(), sink, scheduler),
        running: true,
        events: 0,
    };

    event_loop
        .handle()
        .insert_source(frames, |event, _, state: &mut ProcessingState| match event {
            Event::Msg(event) => {
                event.apply(&mut state.pipeline);
                state.events += 1;
            }
            Event::Closed => {
                debug!("Frame channel closed");
                state.running = false;
            }
        })
        .map_err(|e| anyhow::anyhow!("inserting frame channel: {}", e.error))?;

    let poll_interval = Duration::from_millis(config.poll_interval_ms);
    let status_interval = Duration::from_secs(config.status_interval_s);
    let mut last_status_log = Instant::now();

    loop {
        if shutdown_requested() {
            info!("Shutdown signal received, stopping processing");
            break;
        }
        if !state.running && drained(&state, &clock) {
            break;
        }

        if last_status_log.elapsed() >= status_interval {
            info!("Pipeline status: {}", state.pipeline.status_sexp());
            last_status_log = Instant::now();
        }

        event_loop
            .dispatch(Some(poll_interval), &mut state)
            .context("dispatching processing loop")?;
    }

    info!("Processing stopped after {} event(s)", state.events);
    Ok(state.pipeline.status_sexp())
}

// ── Producer ────────────────────────────────────────────────

/// Read frames from stdin, stamping each with its arrival time.
fn spawn_producer(
    frames: channel::Sender<TraceEvent>,
    clock: Clock,
) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("pager-producer".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!("Reading stdin failed: {}", e);
                        break;
                    }
                };
                match trace::parse_line_at(&line, clock.now_s()) {
                    Ok(Some(event)) => {
                        if frames.send(event).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!("Skipping malformed frame: {}", e),
                }
            }
            debug!("Producer input ended");
        })
}

// ── Delivery ────────────────────────────────────────────────

struct DeliveryState {
    running: bool,
    delivered: u64,
    clock: Clock,
}

/// Run live mode.
pub fn run(config: &PagerConfig) -> anyhow::Result<()> {
    let policy = config.load_policy()?;
    let clock = Clock::new();

    let (frame_tx, frame_rx) = channel::channel::<TraceEvent>();
    let (command_tx, command_rx) = channel::channel::<PagerCommand>();

    let processing_config = config.clone();
    let processing = thread::Builder::new()
        .name("pager-processing".into())
        .spawn(move || run_processing(frame_rx, command_tx, policy, &processing_config, clock))
        .context("spawning processing thread")?;

    // Not joined: it may be blocked on stdin at shutdown
    spawn_producer(frame_tx, clock).context("spawning producer thread")?;

    let mut event_loop =
        EventLoop::<DeliveryState>::try_new().context("creating delivery event loop")?;
    event_loop
        .handle()
        .insert_source(command_rx, |event, _, state: &mut DeliveryState| match event {
            Event::Msg(command) => {
                let timed = TimedCommand {
                    timestamp_s: state.clock.now_s(),
                    command,
                };
                println!("{}", timed.to_sexp());
                state.delivered += 1;
            }
            Event::Closed => state.running = false,
        })
        .map_err(|e| anyhow::anyhow!("inserting command channel: {}", e.error))?;

    install_signal_handlers();

    let mut state = DeliveryState {
        running: true,
        delivered: 0,
        clock,
    };
    let poll_interval = Duration::from_millis(config.poll_interval_ms);
    info!(
        "Live mode started ({} policy, poll interval: {}ms), reading frames from stdin",
        config.instrument.as_str(),
        config.poll_interval_ms
    );

    while state.running {
        if shutdown_requested() {
            info!("Shutdown signal received, exiting");
            break;
        }
        event_loop.dispatch(Some(poll_interval), &mut state)?;
    }

    match processing.join() {
        Ok(Ok(status)) => info!("Final status: {}", status),
        Ok(Err(e)) => return Err(e.context("processing thread failed")),
        Err(_) => anyhow::bail!("processing thread panicked"),
    }
    info!("Live mode shutting down ({} command(s) delivered)", state.delivered);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::{EyeState, HeadShakeDirection};
    use crate::pipeline::ProducerFrame;
    use crate::policy::Instrument;
    use crate::sink::{CommandLog, PageDirection};

    #[test]
    fn test_clock_instants() {
        let clock = Clock::new();
        assert!(clock.now_s() >= 0.0);
        assert_eq!(clock.instant_at(-1.0), clock.instant_at(0.0));
        assert_eq!(clock.instant_at(f64::NAN), clock.instant_at(0.0));
        assert_eq!(
            clock.instant_at(1.5) - clock.instant_at(0.0),
            Duration::from_millis(1500)
        );
    }

    #[test]
    fn test_processing_until_channel_closes() {
        let (tx, rx) = channel::channel::<TraceEvent>();
        let log = CommandLog::new();
        let frames = [
            ProducerFrame {
                head_shake: Some(HeadShakeDirection::Right),
                ..ProducerFrame::at(0.0)
            },
            ProducerFrame {
                eyes: Some(EyeState::new(false, false)),
                ..ProducerFrame::at(0.3)
            },
            ProducerFrame {
                eyes: Some(EyeState::new(true, true)),
                ..ProducerFrame::at(0.5)
            },
        ];
        for frame in frames {
            tx.send(TraceEvent::Frame(frame)).unwrap();
        }
        drop(tx);

        let config = PagerConfig {
            poll_interval_ms: 10,
            ..PagerConfig::default()
        };
        let status = run_processing(
            rx,
            log.clone(),
            InstrumentMode::for_instrument(Instrument::Piano),
            &config,
            Clock::new(),
        )
        .unwrap();
        assert_eq!(
            log.snapshot(),
            vec![
                PagerCommand::AwaitingConfirmation(PageDirection::Next),
                PagerCommand::TurnPage(PageDirection::Next),
            ]
        );
        assert!(status.contains(":frames 3"));
    }

    #[test]
    fn test_pending_confirmation_expires_after_input_ends() {
        let clock = Clock::new();
        let (tx, rx) = channel::channel::<TraceEvent>();
        let log = CommandLog::new();
        let policy = InstrumentMode::builder(Instrument::Piano)
            .confirmation_timeout(0.1)
            .build()
            .unwrap();
        tx.send(TraceEvent::Frame(ProducerFrame {
            head_shake: Some(HeadShakeDirection::Right),
            ..ProducerFrame::at(clock.now_s())
        }))
        .unwrap();
        drop(tx);

        let config = PagerConfig {
            poll_interval_ms: 10,
            ..PagerConfig::default()
        };
        let status = run_processing(rx, log.clone(), policy, &config, clock).unwrap();
        assert_eq!(
            log.snapshot(),
            vec![
                PagerCommand::AwaitingConfirmation(PageDirection::Next),
                PagerCommand::ConfirmationExpired,
            ]
        );
        assert!(status.contains(":state :ready"));
        assert!(clock.now_s() >= 0.1);
    }

    #[test]
    fn test_timer_expires_pending_confirmation() {
        let clock = Clock::new();
        let log = CommandLog::new();
        let policy = InstrumentMode::builder(Instrument::Piano)
            .confirmation_timeout(0.1)
            .build()
            .unwrap();

        let mut event_loop = EventLoop::<'static, ProcessingState>::try_new().unwrap();
        let scheduler = CalloopScheduler::new(event_loop.handle(), clock);
        let mut state = ProcessingState {
            pipeline: GesturePipeline::new(
                policy,
                PagerConfig::default().lifecycle_config(),
                log.clone(),
                scheduler,
            ),
            running: true,
            events: 0,
        };
        state.pipeline.process_frame(&ProducerFrame {
            head_shake: Some(HeadShakeDirection::Left),
            ..ProducerFrame::at(clock.now_s())
        });

        let give_up = Instant::now() + Duration::from_secs(2);
        while !log.snapshot().contains(&PagerCommand::ConfirmationExpired) {
            assert!(Instant::now() < give_up, "timeout never fired");
            event_loop
                .dispatch(Some(Duration::from_millis(20)), &mut state)
                .unwrap();
        }
        assert_eq!(
            log.snapshot(),
            vec![
                PagerCommand::AwaitingConfirmation(PageDirection::Previous),
                PagerCommand::ConfirmationExpired,
            ]
        );
        assert_eq!(state.pipeline.coordinator().stats().expirations, 1);
    }
}
