use thiserror::Error;

/// The error type for `segnets-burn` operations.
///
/// Covers configuration problems detected before any module is built and input tensors whose
/// layout does not match the model they are fed to.
#[derive(Error, Debug)]
pub enum SegNetError {
    /// Error for when an unsupported backbone network is specified.
    #[error("Unsupported backbone: `{backbone}`, use mobilenet, resnet50")]
    UnsupportedBackbone {
        /// The name of the unsupported backbone.
        backbone: String,
    },

    /// Error for when an invalid model configuration is provided.
    /// This can happen if configuration parameters are out of range or logically inconsistent.
    #[error("Invalid model configuration: {reason}")]
    InvalidConfiguration {
        /// The reason why the configuration is invalid.
        reason: String,
    },

    /// Error for when an input tensor has an invalid shape.
    #[error("Invalid input tensor shape: expected {expected}, got {actual}")]
    InvalidTensorShape {
        /// The expected tensor shape.
        expected: String,
        /// The actual tensor shape.
        actual: String,
    },

    /// Error for when a configuration file cannot be read or parsed.
    #[error("Failed to load configuration: {0}")]
    Config(#[from] burn::config::ConfigError),
}

/// A specialized `Result` type for `segnets-burn` operations.
pub type SegNetResult<T> = Result<T, SegNetError>;
