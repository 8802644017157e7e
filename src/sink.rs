//! Commands emitted to the page renderer and the sinks that carry them.
//!
//! The coordinator never owns the consumer: it holds a `CommandSink`, which
//! is either a channel sender into the delivery context or a shared log.

use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::gesture::GestureTriggered;

// ── PageDirection ───────────────────────────────────────────

/// Direction of a page turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageDirection {
    Next,
    Previous,
}

impl PageDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Next => "next",
            Self::Previous => "previous",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "next" => Some(Self::Next),
            "previous" => Some(Self::Previous),
            _ => None,
        }
    }
}

// ── PagerCommand ────────────────────────────────────────────

/// Everything the engine tells the outside world.
#[derive(Debug, Clone, PartialEq)]
pub enum PagerCommand {
    /// A fully resolved page turn.
    TurnPage(PageDirection),
    /// A head-shake proposal is waiting for a confirming blink.
    AwaitingConfirmation(PageDirection),
    /// The pending proposal timed out unconfirmed.
    ConfirmationExpired,
    /// The pending proposal was dropped by a policy swap.
    ConfirmationDiscarded(PageDirection),
    /// A secondary gesture fired (diagnostic surface).
    GestureTriggered(GestureTriggered),
}

impl PagerCommand {
    /// Serialize the command as an s-expression event.
    pub fn to_sexp(&self) -> String {
        match self {
            Self::TurnPage(direction) => format!(
                "(:type :event :event :page-turn :direction :{})",
                direction.as_str()
            ),
            Self::AwaitingConfirmation(direction) => format!(
                "(:type :event :event :awaiting-confirmation :direction :{})",
                direction.as_str()
            ),
            Self::ConfirmationExpired => {
                "(:type :event :event :confirmation-expired)".to_string()
            }
            Self::ConfirmationDiscarded(direction) => format!(
                "(:type :event :event :confirmation-discarded :direction :{})",
                direction.as_str()
            ),
            Self::GestureTriggered(evt) => evt.to_sexp(),
        }
    }
}

// ── Sinks ───────────────────────────────────────────────────

/// Receiver of pager commands.  Delivery is exactly once, in emission order.
pub trait CommandSink {
    fn deliver(&mut self, command: PagerCommand);
}

/// Hands commands to a calloop event loop, possibly on another thread.
/// A closed receiver means nobody is listening; commands are dropped.
impl CommandSink for calloop::channel::Sender<PagerCommand> {
    fn deliver(&mut self, command: PagerCommand) {
        if let Err(err) = self.send(command) {
            debug!("Command receiver gone, dropping {:?}", err.0);
        }
    }
}

/// Shared in-memory command record.  Clones see the same log.
#[derive(Debug, Clone, Default)]
pub struct CommandLog {
    inner: Arc<Mutex<Vec<PagerCommand>>>,
}

impl CommandLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything recorded so far.
    pub fn drain(&self) -> Vec<PagerCommand> {
        match self.inner.lock() {
            Ok(mut log) => std::mem::take(&mut *log),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    /// Copy of everything recorded so far.
    pub fn snapshot(&self) -> Vec<PagerCommand> {
        match self.inner.lock() {
            Ok(log) => log.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl CommandSink for CommandLog {
    fn deliver(&mut self, command: PagerCommand) {
        match self.inner.lock() {
            Ok(mut log) => log.push(command),
            Err(poisoned) => poisoned.into_inner().push(command),
        }
    }
}
