//! Exit codes shared by every command.

pub const SUCCESS: i32 = 0;

/// Any failure: bad arguments, invalid input, I/O or store errors.
pub const ERROR: i32 = 2;
