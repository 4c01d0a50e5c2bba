//! Result type alias for gridsync operations

use crate::Error;

/// Result type alias for gridsync operations
pub type Result<T> = std::result::Result<T, Error>;
