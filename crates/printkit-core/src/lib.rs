//! # printkit core
//!
//! Core types, errors, and events for the printkit printer control library.
//! Provides the fundamental abstractions shared by the transport and session
//! layers: the printer state machine vocabulary, the error taxonomy, the
//! temperature record, the static G/M-code catalogue, and the event bus.

pub mod error;
pub mod events;
pub mod gcode;
pub mod temperature;
pub mod types;

pub use error::{Error, JobError, ProtocolError, Result, StateError, TransportError};
pub use events::{EventBus, PrinterEvent, SubscriptionId};
pub use gcode::{GCommand, MCommand};
pub use temperature::Temperature;
pub use types::{Axis, PrinterState, SchedulerConfig, Units};
