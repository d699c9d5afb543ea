//! Gao client.
//!
//! Spawns the sandbox subprocess, talks to it over a private line-based
//! channel, and mirrors the Gaolettes it manages.
//!
//! ```rust,no_run
//! use gao::{MemoryPolicy, Orchestrator, OrchestratorOptions, PerfSpec};
//!
//! # fn example() -> gao::GaoResult<()> {
//! let mut orchestrator = Orchestrator::new(OrchestratorOptions::from_env()?)?;
//!
//! let spec = PerfSpec::new(64 << 20, MemoryPolicy::Static).with_max_cpu_cores(2);
//! let mut gaolette = orchestrator.create(spec)?;
//! let state = orchestrator.fetch_state(&mut gaolette)?;
//! println!("gaolette {} is {}", gaolette.id(), state);
//!
//! orchestrator.destroy(&mut gaolette)?;
//! let disposition = orchestrator.shutdown();
//! println!("subprocess {}", disposition);
//! # Ok(())
//! # }
//! ```

pub mod channel;
mod gaolette;
pub mod logging;
mod options;
mod orchestrator;
pub mod util;

pub use channel::{Channel, Line, LineEnd};
pub use gaolette::Gaolette;
pub use logging::{
    BufferedSink, LogKind, LogLevel, LogRecord, LogSink, LoggingOptions, Priority, TracingSink,
    WriterSink, init_logging,
};
pub use options::{BIN_DIR_ENV, OrchestratorOptions};
pub use orchestrator::{ExitDisposition, KillHandle, Orchestrator, SharedOrchestrator};

pub use gao_shared::errors::{CreationFailure, GaoError, GaoResult};
pub use gao_shared::{GaoletteId, GaoletteState, MemoryPolicy, PerfSpec, UNASSIGNED_ID};
