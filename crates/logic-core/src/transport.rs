use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    context::CallContext,
    error::{DecodeError, TransportError},
    types::{Request, Response},
};

/// Opaque request/response channel underneath the dispatcher.
///
/// Implementations deliver each request at most once and never retry on
/// their own.
pub trait Transport: Send + Sync {
    fn send(&self, request: &[u8]) -> Result<Vec<u8>, TransportError>;
}

/// What actually travels over the transport for one call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestEnvelope {
    /// Correlates log lines of one round trip.
    pub call_id: Uuid,
    pub context: CallContext,
    pub request: Request,
}

impl RequestEnvelope {
    pub fn new(context: CallContext, request: Request) -> Self {
        Self {
            call_id: Uuid::new_v4(),
            context,
            request,
        }
    }
}

pub fn encode_request(envelope: &RequestEnvelope) -> Result<Vec<u8>, DecodeError> {
    serde_json::to_vec(envelope).map_err(|err| DecodeError::Encode(err.to_string()))
}

pub fn decode_response(bytes: &[u8]) -> Result<Response, DecodeError> {
    serde_json::from_slice(bytes).map_err(|err| DecodeError::Malformed(err.to_string()))
}

type MockHandler = dyn Fn(&RequestEnvelope) -> Result<Response, TransportError> + Send + Sync;

/// In-process transport answering requests with a handler closure.
pub struct MockTransport {
    handler: Box<MockHandler>,
    calls: AtomicUsize,
}

impl MockTransport {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&RequestEnvelope) -> Result<Response, TransportError> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of requests that reached this transport.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transport for MockTransport {
    fn send(&self, request: &[u8]) -> Result<Vec<u8>, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let envelope: RequestEnvelope = serde_json::from_slice(request)
            .map_err(|err| TransportError::Protocol(err.to_string()))?;
        let response = (self.handler)(&envelope)?;
        serde_json::to_vec(&response).map_err(|err| TransportError::Protocol(err.to_string()))
    }
}
