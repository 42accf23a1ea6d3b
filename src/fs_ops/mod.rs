//! Filesystem operations: tree statistics, free space, marker files and
//! io error enrichment.

pub mod helpers;
pub mod markers;
pub mod probe;
pub mod space;

pub use helpers::io_error_with_help;
pub use markers::Marker;
pub use probe::{FileStats, directory_size, format_bytes, format_speed, scan_directory};
pub use space::{SpaceCheck, check_disk_space};
