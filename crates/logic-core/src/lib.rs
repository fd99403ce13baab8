//! Data-fetching core shared by every forum list and detail view.
//!
//! This crate defines the request/response protocol, the error taxonomy, the
//! explicit call context, the transport boundary, and the dispatcher that
//! moves calls between the foreground and background contexts.

/// Per-call configuration passed in by the application.
pub mod context;
/// Typed request dispatch with sync and async delivery.
pub mod dispatcher;
/// Stable error types and categories.
pub mod error;
/// Foreground continuation primitive.
pub mod foreground;
/// Domain-error policy applied to decoded payloads.
pub mod normalization;
/// Backoff policy used by caller-side retry loops.
pub mod retry;
/// Transport boundary, request envelope and in-memory mock transport.
pub mod transport;
/// Protocol types (operations, requests, responses, items).
pub mod types;

pub use context::{AuthInfo, CallContext, Device, LogicContext};
pub use dispatcher::Dispatcher;
pub use error::{DecodeError, DispatchError, DomainError, ErrorCategory, TransportError};
pub use foreground::{ForegroundError, ForegroundHandle, ForegroundLoop, ForegroundTask};
pub use normalization::{DomainErrorPolicy, normalize_payload};
pub use retry::RetryPolicy;
pub use transport::{MockTransport, RequestEnvelope, Transport};
pub use types::{
    ContentParseRequest, ContentParseResponse, ErrorMessage, Forum, ForumListRequest,
    ForumListResponse, LightPost, LocalUserRequest, LocalUserResponse, Operation, Post, PostId,
    PostVoteRequest, PostVoteResponse, Request, Response, ResponsePayload, Span,
    TopicDetailsRequest, TopicDetailsResponse, Topic, TopicListRequest, TopicListResponse,
    TopicWithLightPost, User, UserPostListRequest, UserPostListResponse, UserTopicListRequest,
    UserTopicListResponse, VoteOperation, VoteState,
};
