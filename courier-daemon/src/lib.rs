//! # courier-daemon
//!
//! Long-running scheduler: fires one publication run per day at the
//! configured UTC time, serves a Unix-socket control protocol, and manages
//! launchd supervision.

pub mod error;
pub mod launchd;
pub mod log_rotation;
pub mod paths;
pub mod protocol;
pub mod runtime;
pub mod schedule;

pub use error::DaemonError;
pub use launchd::{install as install_launchd, uninstall as uninstall_launchd};
pub use protocol::{request_run, request_status, request_stop};
pub use runtime::start_blocking;
