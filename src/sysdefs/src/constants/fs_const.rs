pub const STDIN_FILENO: usize = 0;
pub const STDOUT_FILENO: usize = 1;

/// Size of every process's file table.
pub const MAX_OPEN_FILES: usize = 16;

/// Longest string (without its NUL terminator) the kernel copies out of
/// user memory.
pub const MAX_STRING_LENGTH: usize = 256;

/// Name reported by the console's file handles.
pub const CONSOLE_NAME: &str = "SynchConsole";

/// Suffix every executable passed to exec must carry.
pub const EXECUTABLE_SUFFIX: &str = ".coff";
