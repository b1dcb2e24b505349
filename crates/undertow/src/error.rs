use thiserror::Error;

/// Fatal routing errors.
///
/// Individual command failures are reported as booleans and logged;
/// only failure to reach the server or to create the processing sink
/// is unrecoverable. Retry policy is a caller concern.
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("audio server metadata unavailable")]
    ServerInfoUnavailable,

    #[error("default output device '{name}' could not be queried")]
    DefaultSinkUnavailable { name: String },

    #[error("processing sink '{name}' could not be created")]
    SinkUnavailable { name: String },
}
