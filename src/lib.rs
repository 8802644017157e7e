//! Hands-free page turning for sheet music.
//!
//! Fuses eyelid, head-shake and secondary facial gesture signals into
//! page-turn commands under a per-instrument policy.

pub mod backend;
pub mod config;
pub mod coordinator;
pub mod gesture;
pub mod pipeline;
pub mod policy;
pub mod scheduler;
pub mod sexp;
pub mod sink;
pub mod trace;

pub use coordinator::{CoordinatorState, GestureCoordinator};
pub use pipeline::{GesturePipeline, ProducerFrame};
pub use policy::{Instrument, InstrumentMode, PolicyError};
pub use sink::{CommandSink, PageDirection, PagerCommand};
