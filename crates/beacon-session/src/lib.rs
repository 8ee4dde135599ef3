//! Session lifecycle and the periodic session timer.

mod error;
mod timer;

pub use error::{SessionError, SessionResult};
pub use timer::{SessionTimer, TickReport};
