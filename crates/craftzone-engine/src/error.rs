//! Error types for the engine binary.
//!
//! [`EngineError`] wraps every failure that can stop the engine before or
//! during the run, so `main` can propagate with `?`.

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: craftzone_core::ConfigError,
    },

    /// The starting world could not be built.
    #[error("world error: {source}")]
    World {
        /// The underlying world error.
        #[from]
        source: craftzone_world::WorldError,
    },
}
