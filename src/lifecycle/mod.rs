//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Logging → Metrics exporter → Pid file → Engine → Sweepers → Listener
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain requests → Stop sweepers → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listeners
//! - Ordered shutdown: stop accept, drain, close
//! - Pid file removed by drop, on every exit path out of `run`

pub mod pidfile;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use pidfile::PidFile;
pub use shutdown::Shutdown;
