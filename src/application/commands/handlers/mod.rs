//! Command Handlers 实现

mod session_command_handlers;

pub use session_command_handlers::*;
