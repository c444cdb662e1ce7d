//! # NetOff
//!
//! A framed request/response protocol coupling a simulation driver
//! (client) and a simulation worker (server) over a single byte-stream
//! connection, run in lockstep: the driver requests, the worker replies,
//! and neither side issues a second request until the last one has been
//! confirmed.
//!
//! The protocol has two phases. The init phase (`crate::message`'s
//! initial-plane tags) registers simulations, selects their input and
//! output variables, and hands out any supporting files. The run phase
//! (the run-plane tags) then exchanges timestamped input/output values,
//! with pause/unpause/reset control messages interleaved.

pub mod cli;
pub mod codec;
pub mod driver;
pub mod error;
pub mod logging;
pub mod message;
pub mod transport;
pub mod value_container;
pub mod variable_list;
pub mod worker;

pub use driver::{DriverSession, DriverState};
pub use error::{NetOffError, Plane, Result};
pub use transport::{Transport, TransportConfig};
pub use value_container::ValueContainer;
pub use variable_list::VariableList;
pub use worker::{WorkerSession, WorkerState};

/// The current version of the netoff crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
