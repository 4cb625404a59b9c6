//! Project persistence: the build script format and legacy import

pub mod legacy;
pub mod script;

pub use legacy::import_legacy;
pub use script::{parse_script, write_filtered, write_script};
