//! # Error Types
//!
//! A single error enum covers every failure mode the coupling protocol
//! can surface. Every fallible entry point in [`crate::worker`] and
//! [`crate::driver`] returns `Result<T, NetOffError>` so that embedding
//! applications can match on the semantic kind rather than parse a string.

use thiserror::Error;

/// Which of the two disjoint message planes a tag was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plane {
    /// The session-setup plane (`ADD_SIM`, `INIT_SIM`, `GET_FILE`, `START`, ...).
    Initial,
    /// The steady-state simulation loop (`INPUTS`, `OUTPUTS`, `PAUSE`, ...).
    Run,
}

impl std::fmt::Display for Plane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Plane::Initial => write!(f, "initial"),
            Plane::Run => write!(f, "run"),
        }
    }
}

/// All errors that can surface from the NetOff protocol core.
///
/// None of these are recovered internally: per the protocol's error
/// handling design, any error past the `NONE` state is expected to be
/// fatal to the session and the embedding application must tear it down.
#[derive(Error, Debug)]
pub enum NetOffError {
    /// The underlying byte-stream transport failed to open, accept,
    /// connect, send, or receive.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// A connect/accept retry budget was exhausted without success.
    #[error("transport unreachable after {attempts} attempts")]
    Unreachable { attempts: u32 },

    /// A decoded field's declared length or count could not be satisfied
    /// by the buffer it was read from.
    #[error("codec error: {0}")]
    Codec(String),

    /// A method was called in the wrong connection/simulation state, or
    /// while a conflicting request was still outstanding.
    #[error("protocol state error: {0}")]
    ProtocolState(String),

    /// A received tag fell outside the enumerated set for the plane it
    /// was read from.
    #[error("unknown tag {tag} on {plane} plane")]
    UnknownTag { plane: Plane, tag: u8 },

    /// `ADD_SIM` was issued with a path that is already registered.
    #[error("duplicate path: {path}")]
    DuplicatePath { path: String },

    /// A frame referenced a `sim_id` with no prior `ADD_SIM`/`INIT_SIM`.
    #[error("unknown sim id: {sim_id}")]
    UnknownSimId { sim_id: i32 },

    /// A container's implicit size disagreed with its bound variable list.
    #[error("size mismatch: expected {expected}, got {got}")]
    SizeMismatch { expected: usize, got: usize },
}

pub type Result<T> = std::result::Result<T, NetOffError>;
