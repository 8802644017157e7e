//! Gesture coordination: fuses blink and head-shake signals into page
//! turns under the active instrument policy.
//!
//! Two states: `Ready` and `AwaitingConfirmation`.  Under a hybrid policy
//! a head shake proposes a direction and a blink confirms it; a deferred
//! timeout check expires the proposal.  The check is never cancelled: on
//! wake it is compared against the live session and dropped if stale, so
//! confirmation and expiry resolve each session exactly once.

use tracing::{debug, info};

use crate::gesture::{
    BlinkRecognizer, EyeState, GestureTriggered, HeadShakeDetector, HeadShakeDirection,
    RepetitionBlinkRecognizer,
};
use crate::policy::{Instrument, InstrumentMode};
use crate::scheduler::{SessionId, TimeoutCheck, TimeoutScheduler};
use crate::sink::{CommandSink, PageDirection, PagerCommand};
use crate::sexp::bool_atom;

// ── State ───────────────────────────────────────────────────

/// Coordinator state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CoordinatorState {
    Ready,
    /// A proposal is pending until a blink confirms it or `deadline_s`.
    AwaitingConfirmation {
        session: SessionId,
        direction: PageDirection,
        started_s: f64,
        deadline_s: f64,
    },
}

impl CoordinatorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::AwaitingConfirmation { .. } => "awaiting-confirmation",
        }
    }
}

/// Running counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoordinatorStats {
    pub pages_next: u64,
    pub pages_previous: u64,
    pub long_blinks: u64,
    pub proposals: u64,
    pub confirmations: u64,
    pub expirations: u64,
    pub discards: u64,
    /// Blinks that resolved nothing (ready under a hybrid policy).
    pub ignored_blinks: u64,
    /// Shakes dropped because a proposal was already pending.
    pub ignored_shakes: u64,
    pub policy_swaps: u64,
}

impl CoordinatorStats {
    pub fn to_sexp(&self) -> String {
        format!(
            "(:pages-next {} :pages-previous {} :long-blinks {} :proposals {} :confirmations {} :expirations {} :discards {} :ignored-blinks {} :ignored-shakes {} :policy-swaps {})",
            self.pages_next,
            self.pages_previous,
            self.long_blinks,
            self.proposals,
            self.confirmations,
            self.expirations,
            self.discards,
            self.ignored_blinks,
            self.ignored_shakes,
            self.policy_swaps,
        )
    }
}

// ── Coordinator ─────────────────────────────────────────────

pub struct GestureCoordinator {
    policy: InstrumentMode,
    state: CoordinatorState,
    recognizer: Box<dyn BlinkRecognizer>,
    head_shake: HeadShakeDetector,
    /// Start of the current both-eyes closure, tracked for long blinks.
    closed_since: Option<f64>,
    sink: Box<dyn CommandSink>,
    scheduler: Box<dyn TimeoutScheduler>,
    next_session: u64,
    stats: CoordinatorStats,
}

impl GestureCoordinator {
    /// Coordinator with the default repetition blink recognizer.
    pub fn new(
        policy: InstrumentMode,
        sink: impl CommandSink + 'static,
        scheduler: impl TimeoutScheduler + 'static,
    ) -> Self {
        let recognizer = RepetitionBlinkRecognizer::new(policy.blink_settings());
        Self::with_recognizer(policy, Box::new(recognizer), sink, scheduler)
    }

    pub fn with_recognizer(
        policy: InstrumentMode,
        mut recognizer: Box<dyn BlinkRecognizer>,
        sink: impl CommandSink + 'static,
        scheduler: impl TimeoutScheduler + 'static,
    ) -> Self {
        recognizer.configure(&policy.blink_settings());
        Self {
            head_shake: HeadShakeDetector::new(policy.head_shake_settings()),
            policy,
            state: CoordinatorState::Ready,
            recognizer,
            closed_since: None,
            sink: Box::new(sink),
            scheduler: Box::new(scheduler),
            next_session: 1,
            stats: CoordinatorStats::default(),
        }
    }

    pub fn policy(&self) -> &InstrumentMode {
        &self.policy
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    pub fn stats(&self) -> &CoordinatorStats {
        &self.stats
    }

    /// Direction of the pending proposal, if any.
    pub fn pending_direction(&self) -> Option<PageDirection> {
        match self.state {
            CoordinatorState::AwaitingConfirmation { direction, .. } => Some(direction),
            CoordinatorState::Ready => None,
        }
    }

    fn emit(&mut self, command: PagerCommand) {
        if let PagerCommand::TurnPage(direction) = command {
            match direction {
                PageDirection::Next => self.stats.pages_next += 1,
                PageDirection::Previous => self.stats.pages_previous += 1,
            }
            info!("Page turn: {}", direction.as_str());
        }
        self.sink.deliver(command);
    }

    // ── Blink channel ───────────────────────────────────────

    /// Feed one frame of eyelid state.  Ignored when the policy disables blink.
    pub fn on_eye_state(&mut self, eyes: EyeState, now_s: f64) {
        if !self.policy.enable_blink() || !now_s.is_finite() {
            return;
        }

        if let Some(long_hold_s) = self.policy.long_blink_s() {
            if eyes.both_closed() {
                if self.closed_since.is_none() {
                    self.closed_since = Some(now_s);
                }
            } else if let Some(since) = self.closed_since.take() {
                let closed_for = now_s - since;
                if closed_for >= long_hold_s {
                    self.stats.long_blinks += 1;
                    debug!("Long blink: {:.0}ms", closed_for * 1000.0);
                    self.emit(PagerCommand::TurnPage(PageDirection::Previous));
                }
            }
        }

        if self.recognizer.update(eyes, now_s) {
            self.on_blink();
        }
    }

    fn on_blink(&mut self) {
        match self.state {
            CoordinatorState::AwaitingConfirmation {
                session, direction, ..
            } => {
                self.state = CoordinatorState::Ready;
                self.stats.confirmations += 1;
                info!("Confirmation {} accepted: {}", session, direction.as_str());
                self.emit(PagerCommand::TurnPage(direction));
            }
            CoordinatorState::Ready if !self.policy.requires_confirmation() => {
                self.emit(PagerCommand::TurnPage(PageDirection::Next));
            }
            CoordinatorState::Ready => {
                self.stats.ignored_blinks += 1;
                debug!("Blink with nothing to confirm");
            }
        }
    }

    // ── Head-shake channel ──────────────────────────────────

    /// Feed a classified head-shake.  Ignored when the policy disables
    /// head-shake; non-lateral directions are discarded.
    pub fn on_head_shake(&mut self, direction: HeadShakeDirection, now_s: f64) {
        if !self.policy.enable_head_shake() || !now_s.is_finite() {
            return;
        }
        let Some(page) = direction.page_direction() else {
            debug!("Discarding head shake {}", direction.as_str());
            return;
        };

        if !self.policy.requires_confirmation() {
            self.emit(PagerCommand::TurnPage(page));
            return;
        }

        if let CoordinatorState::AwaitingConfirmation { session, .. } = self.state {
            self.stats.ignored_shakes += 1;
            debug!("Head shake {} ignored, {} pending", direction.as_str(), session);
            return;
        }

        // Only blinks made after the proposal may confirm it
        self.recognizer.reset();

        let session = SessionId(self.next_session);
        self.next_session += 1;
        let deadline_s = now_s + self.policy.confirmation_timeout_s();
        self.state = CoordinatorState::AwaitingConfirmation {
            session,
            direction: page,
            started_s: now_s,
            deadline_s,
        };
        self.stats.proposals += 1;
        info!(
            "Awaiting confirmation {} for {} until {:.3}s",
            session,
            page.as_str(),
            deadline_s
        );
        self.emit(PagerCommand::AwaitingConfirmation(page));
        self.scheduler.schedule(TimeoutCheck {
            session,
            deadline_s,
        });
    }

    /// Feed a raw yaw angle through the policy's head-shake classifier.
    pub fn on_head_yaw(&mut self, yaw_deg: f64, now_s: f64) {
        if !self.policy.enable_head_shake() {
            return;
        }
        if let Some(direction) = self.head_shake.update(yaw_deg, now_s) {
            self.on_head_shake(direction, now_s);
        }
    }

    // ── Timeout ─────────────────────────────────────────────

    /// A scheduled check woke up.  Expires the proposal only if `check`
    /// targets the live session.  Returns whether it did.
    pub fn on_confirmation_deadline(&mut self, check: TimeoutCheck) -> bool {
        match self.state {
            CoordinatorState::AwaitingConfirmation {
                session, direction, ..
            } if session == check.session => {
                self.state = CoordinatorState::Ready;
                self.stats.expirations += 1;
                info!("Confirmation {} for {} expired", session, direction.as_str());
                self.emit(PagerCommand::ConfirmationExpired);
                true
            }
            _ => {
                debug!("Stale timeout check {} ignored", check.session);
                false
            }
        }
    }

    // ── Secondary gestures ──────────────────────────────────

    /// Forward a secondary gesture trigger to the sink.
    pub fn report_gesture(&mut self, event: GestureTriggered) {
        self.emit(PagerCommand::GestureTriggered(event));
    }

    // ── Policy ──────────────────────────────────────────────

    /// Replace the active policy.  Any pending proposal is discarded (its
    /// scheduled check will find no matching session) and all blink and
    /// head-shake timing state restarts under the new parameters.
    pub fn set_policy(&mut self, policy: InstrumentMode) {
        self.reset();
        self.recognizer.configure(&policy.blink_settings());
        self.head_shake.configure(policy.head_shake_settings());
        info!(
            "Policy switched: {} -> {} ({})",
            self.policy.instrument().as_str(),
            policy.instrument().as_str(),
            policy.classification().as_str()
        );
        self.policy = policy;
        self.stats.policy_swaps += 1;
    }

    pub fn switch_to_instrument(&mut self, instrument: Instrument) {
        self.set_policy(InstrumentMode::for_instrument(instrument));
    }

    /// Return to `Ready` and forget all timing state, keeping the policy.
    pub fn reset(&mut self) {
        if let CoordinatorState::AwaitingConfirmation {
            session, direction, ..
        } = self.state
        {
            self.stats.discards += 1;
            info!("Confirmation {} for {} discarded", session, direction.as_str());
            self.emit(PagerCommand::ConfirmationDiscarded(direction));
        }
        self.state = CoordinatorState::Ready;
        self.closed_since = None;
        self.recognizer.reset();
        self.head_shake.reset();
    }

    /// Generate s-expression for status reporting.
    pub fn status_sexp(&self) -> String {
        let pending = match self.state {
            CoordinatorState::AwaitingConfirmation {
                session,
                direction,
                started_s,
                deadline_s,
            } => format!(
                "(:session {} :direction :{} :started {:.3} :deadline {:.3})",
                session.0,
                direction.as_str(),
                started_s,
                deadline_s
            ),
            CoordinatorState::Ready => "nil".to_string(),
        };
        format!(
            "(:state :{} :pending {} :eyes-closed {} :blink {} :shake-cooldown {} :policy {} :stats {})",
            self.state.as_str(),
            pending,
            bool_atom(self.closed_since.is_some()),
            self.recognizer.status_sexp(),
            bool_atom(self.head_shake.in_cooldown()),
            self.policy.config_sexp(),
            self.stats.to_sexp(),
        )
    }
}
