//! Typed request/response bridge over an opaque [`Transport`].

use std::sync::{Arc, Weak};

use tokio::runtime::Handle;
use tracing::{debug, trace, warn};

use crate::{
    context::LogicContext,
    error::{DecodeError, DispatchError},
    foreground::ForegroundHandle,
    normalization::{DomainErrorPolicy, normalize_payload},
    transport::{RequestEnvelope, Transport, decode_response, encode_request},
    types::{Request, ResponsePayload},
};

/// Uniform call surface for every logic operation.
///
/// Holds only shared handles, so clones are cheap and need no locking.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    context: Arc<LogicContext>,
    background: Handle,
    foreground: ForegroundHandle,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("context", &self.context)
            .field("foreground", &self.foreground)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        context: LogicContext,
        background: Handle,
        foreground: ForegroundHandle,
    ) -> Self {
        Self {
            transport,
            context: Arc::new(context),
            background,
            foreground,
        }
    }

    pub fn context(&self) -> &LogicContext {
        &self.context
    }

    pub fn foreground(&self) -> &ForegroundHandle {
        &self.foreground
    }

    /// Run one round trip on the calling thread.
    ///
    /// Blocks on the transport; never call this from the foreground context.
    pub fn call<R: ResponsePayload>(
        &self,
        request: impl Into<Request>,
        policy: DomainErrorPolicy,
    ) -> Result<R, DispatchError> {
        let envelope = RequestEnvelope::new(self.context.call_context(), request.into());
        let call_id = envelope.call_id;
        let operation = envelope.request.operation();
        debug!(
            %call_id,
            %operation,
            page = ?envelope.request.page(),
            "dispatching logic call"
        );

        let result = self.round_trip::<R>(&envelope, policy);
        match &result {
            Ok(_) => debug!(%call_id, %operation, "logic call completed"),
            Err(err) => warn!(
                %call_id,
                %operation,
                code = err.code(),
                error = %err,
                "logic call failed"
            ),
        }
        result
    }

    fn round_trip<R: ResponsePayload>(
        &self,
        envelope: &RequestEnvelope,
        policy: DomainErrorPolicy,
    ) -> Result<R, DispatchError> {
        let bytes = encode_request(envelope)?;
        let reply = self.transport.send(&bytes)?;
        let response = decode_response(&reply)?;

        let expected = envelope.request.operation();
        if response.operation() != expected {
            warn!(
                expected = %expected,
                actual = %response.operation(),
                backend_error = ?response.error().map(|error| error.info.as_str()),
                "response does not answer the request"
            );
            return Err(DecodeError::UnexpectedResponse {
                expected,
                actual: response.operation(),
            }
            .into());
        }
        let payload = R::from_response(response).map_err(|other| {
            DecodeError::UnexpectedResponse {
                expected: R::OPERATION,
                actual: other.operation(),
            }
        })?;

        normalize_payload(payload, policy, &self.context)
    }

    /// Run the call in the background and deliver the outcome, success or
    /// failure, to the foreground context exactly once.
    pub fn try_call_async<R, F>(
        &self,
        request: impl Into<Request>,
        policy: DomainErrorPolicy,
        on_result: F,
    ) where
        R: ResponsePayload,
        F: FnOnce(Result<R, DispatchError>) + Send + 'static,
    {
        let request = request.into();
        let dispatcher = self.clone();
        self.background.spawn_blocking(move || {
            let result = dispatcher.call::<R>(request, policy);
            if dispatcher.foreground.post(move || on_result(result)).is_err() {
                trace!("foreground loop gone; dropping logic call result");
            }
        });
    }

    /// Like [`Self::try_call_async`], but the outcome is only delivered while
    /// `target` is still alive.
    pub fn try_call_async_to<S, R, F>(
        &self,
        target: Weak<S>,
        request: impl Into<Request>,
        policy: DomainErrorPolicy,
        on_result: F,
    ) where
        S: Send + Sync + 'static,
        R: ResponsePayload,
        F: FnOnce(Arc<S>, Result<R, DispatchError>) + Send + 'static,
    {
        let request = request.into();
        let dispatcher = self.clone();
        self.background.spawn_blocking(move || {
            let result = dispatcher.call::<R>(request, policy);
            let posted = dispatcher
                .foreground
                .post_to(target, move |target| on_result(target, result));
            if posted.is_err() {
                trace!("foreground loop gone; dropping logic call result");
            }
        });
    }

    /// Fire-and-forget form: `on_success` runs on the foreground context only
    /// when the call succeeds. Failures are logged by [`Self::call`].
    pub fn call_async<R, F>(
        &self,
        request: impl Into<Request>,
        policy: DomainErrorPolicy,
        on_success: F,
    ) where
        R: ResponsePayload,
        F: FnOnce(R) + Send + 'static,
    {
        self.try_call_async::<R, _>(request, policy, move |result| {
            if let Ok(payload) = result {
                on_success(payload);
            }
        });
    }
}
