//! Lifecycle management.
//!
//! ```text
//! Ctrl-C / command finished
//!     → Shutdown::trigger (reaper exits)
//!     → Pool::close (idle connections closed, acquires refused)
//! ```

pub mod shutdown;

pub use shutdown::{join_task, wait_for_ctrl_c, Shutdown};
