use thiserror::Error;

/// The abstract error kinds of spec.md §7. `NonInnovative` is deliberately
/// absent: it is not an error, just the `false` case of
/// `Decoder::add_if_innovative`'s boolean return.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("datagram too short or unknown frame type: {0}")]
    MalformedHeader(String),

    #[error("encoded packet coefficient width {got} does not match flow window {expected}")]
    CoefficientWidthMismatch { expected: usize, got: usize },

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("wire message illegal for current flow state: {0}")]
    StateViolation(String),

    #[error("socket failure: {0}")]
    SocketFailure(#[from] std::io::Error),
}
