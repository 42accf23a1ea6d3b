//! Platform-specific helpers.
//! Hides OS differences (Unix/Windows) behind a uniform API: secure config and
//! log file creation, hidden marker files and reparse-point detection.

mod temp;
#[cfg(unix)]
mod unix;
#[cfg(not(unix))]
mod windows;

#[cfg(unix)]
pub use unix::{
    has_reparse_attribute, hide_path, open_log_file_secure_append, set_dir_mode_0700,
    write_config_secure_new,
};

#[cfg(not(unix))]
pub use windows::{
    has_reparse_attribute, hide_path, open_log_file_secure_append, set_dir_mode_0700,
    write_config_secure_new,
};
