//! CLI Exit Code Registry
//!
//! Single source of truth for the `murmur` exit codes. Scripts rely on them.
//!
//! | Code | Meaning                                      |
//! |------|----------------------------------------------|
//! | 0    | Success                                      |
//! | 1    | General error (unspecified)                  |
//! | 2    | Usage error (bad args, unparsable value)     |
//! | 3    | Device config could not be read or parsed    |
//! | 4    | Local storage could not be read or written   |

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments.
pub const EXIT_USAGE: u8 = 2;

/// The file given with --config is unreadable or not valid TOML.
pub const EXIT_CONFIG: u8 = 3;

/// The settings store failed (I/O, serialization).
pub const EXIT_STORAGE: u8 = 4;
