//! Types shared by both ends of the Gao channel.
//!
//! The client (`gao`) and any sandbox subprocess agree on the resource
//! specification, the Gaolette state codes and the line grammar defined here.

pub mod errors;
pub mod types;
pub mod wire;

pub use errors::{CreationFailure, GaoError, GaoResult};
pub use types::{GaoletteId, GaoletteState, MemoryPolicy, PerfSpec, UNASSIGNED_ID};
pub use wire::{Command, Response};
