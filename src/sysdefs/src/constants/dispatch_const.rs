//! Return codes produced by the dispatcher itself rather than a handler.

/// The target process is exiting or gone, or the machine has halted, so
/// the call cannot be made.
pub const ENOPROCESS: i32 = -3;

/// No handler is registered for the requested syscall number.
pub const EAPIABORTED: i32 = -2;
