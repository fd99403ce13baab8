use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{ErrorMessage, Operation};

/// Broad error category used for display and retry decisions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Connectivity, timeout or channel failure below the dispatcher.
    Transport,
    /// Response could not be decoded or did not match the request.
    Decode,
    /// Backend reported an operation-specific failure.
    Domain,
}

/// Failure reported by the transport channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("request timed out after {0} ms")]
    Timeout(u64),
    #[error("transport channel is closed")]
    Closed,
    /// The peer did not speak the expected envelope format.
    #[error("transport protocol violation: {0}")]
    Protocol(String),
}

/// Failure turning bytes into the response the caller asked for.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("request could not be encoded: {0}")]
    Encode(String),
    #[error("malformed response payload: {0}")]
    Malformed(String),
    #[error("expected '{expected}' response, got '{actual}'")]
    UnexpectedResponse {
        expected: Operation,
        actual: Operation,
    },
}

/// Backend-reported failure carried by a well-formed response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation} rejected by backend ({code}): {info}")]
pub struct DomainError {
    pub operation: Operation,
    pub code: String,
    pub info: String,
}

impl DomainError {
    pub fn new(operation: Operation, message: &ErrorMessage) -> Self {
        Self {
            operation,
            code: message.code.clone(),
            info: message.info.clone(),
        }
    }
}

/// Every way a logic call can fail, surfaced uniformly to callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl DispatchError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Transport(_) => ErrorCategory::Transport,
            Self::Decode(_) => ErrorCategory::Decode,
            Self::Domain(_) => ErrorCategory::Domain,
        }
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Transport(TransportError::Connection(_)) => "transport_connection",
            Self::Transport(TransportError::Timeout(_)) => "transport_timeout",
            Self::Transport(TransportError::Closed) => "transport_closed",
            Self::Transport(TransportError::Protocol(_)) => "transport_protocol",
            Self::Decode(DecodeError::Encode(_)) => "encode_failed",
            Self::Decode(DecodeError::Malformed(_)) => "malformed_response",
            Self::Decode(DecodeError::UnexpectedResponse { .. }) => "unexpected_response",
            Self::Domain(_) => "domain_error",
        }
    }

    /// Whether repeating the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(TransportError::Connection(_) | TransportError::Timeout(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categorizes_each_error_family() {
        let transport = DispatchError::from(TransportError::Timeout(5_000));
        let decode = DispatchError::from(DecodeError::Malformed("eof".into()));
        let domain = DispatchError::from(DomainError::new(
            Operation::PostVote,
            &ErrorMessage::new("1", "already voted"),
        ));

        assert_eq!(transport.category(), ErrorCategory::Transport);
        assert_eq!(decode.category(), ErrorCategory::Decode);
        assert_eq!(domain.category(), ErrorCategory::Domain);
    }

    #[test]
    fn keeps_error_codes_stable() {
        assert_eq!(
            DispatchError::from(TransportError::Closed).code(),
            "transport_closed"
        );
        assert_eq!(
            DispatchError::from(DecodeError::UnexpectedResponse {
                expected: Operation::ForumList,
                actual: Operation::TopicList,
            })
            .code(),
            "unexpected_response"
        );
    }

    #[test]
    fn only_transient_transport_failures_are_retryable() {
        assert!(DispatchError::from(TransportError::Connection("reset".into())).is_retryable());
        assert!(DispatchError::from(TransportError::Timeout(100)).is_retryable());
        assert!(!DispatchError::from(TransportError::Closed).is_retryable());
        assert!(!DispatchError::from(DecodeError::Malformed("x".into())).is_retryable());
    }

    #[test]
    fn domain_error_message_names_operation() {
        let err = DomainError::new(
            Operation::LocalUser,
            &ErrorMessage::new("404", "no such user"),
        );
        assert_eq!(
            err.to_string(),
            "local_user rejected by backend (404): no such user"
        );
    }
}
