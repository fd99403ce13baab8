use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    context::LogicContext,
    error::{DispatchError, DomainError},
    types::ResponsePayload,
};

/// How a call treats a domain error carried by an otherwise valid payload.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DomainErrorPolicy {
    /// Report the domain error to the caller as `DispatchError::Domain`.
    #[default]
    Surface,
    /// Log the domain error and hand the payload over as-is.
    Ignore,
}

/// Apply the domain-error policy to a decoded payload.
///
/// Infos listed in the context's success messages count as success under
/// every policy.
pub fn normalize_payload<R: ResponsePayload>(
    payload: R,
    policy: DomainErrorPolicy,
    context: &LogicContext,
) -> Result<R, DispatchError> {
    let Some(message) = payload.error() else {
        return Ok(payload);
    };

    if context.is_success_message(&message.info) {
        debug!(
            operation = %R::OPERATION,
            info = %message.info,
            "domain message treated as success"
        );
        return Ok(payload);
    }

    match policy {
        DomainErrorPolicy::Surface => Err(DomainError::new(R::OPERATION, message).into()),
        DomainErrorPolicy::Ignore => {
            debug!(
                operation = %R::OPERATION,
                code = %message.code,
                info = %message.info,
                "ignoring domain error by call policy"
            );
            Ok(payload)
        }
    }
}
