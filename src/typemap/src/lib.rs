//! Conversions from raw syscall arguments to the types handlers work with,
//! and copies between kernel buffers and the memory of the cage an
//! argument belongs to.
pub mod syscall_conv;
