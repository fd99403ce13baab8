use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable operation tag shared by a request and its mirrored response.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    ForumList,
    TopicList,
    TopicDetails,
    UserTopicList,
    UserPostList,
    PostVote,
    LocalUser,
    ContentParse,
}

impl Operation {
    /// Machine-readable name, identical to the serialized tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ForumList => "forum_list",
            Self::TopicList => "topic_list",
            Self::TopicDetails => "topic_details",
            Self::UserTopicList => "user_topic_list",
            Self::UserPostList => "user_post_list",
            Self::PostVote => "post_vote",
            Self::LocalUser => "local_user",
            Self::ContentParse => "content_parse",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend-reported failure carried inside an otherwise well-formed response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ErrorMessage {
    /// Backend error code (opaque to the client).
    pub code: String,
    /// Human-readable description.
    pub info: String,
}

impl ErrorMessage {
    pub fn new(code: impl Into<String>, info: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            info: info.into(),
        }
    }
}

/// Forum board metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Forum {
    pub id: String,
    pub name: String,
    /// Short board description, may be empty.
    pub info: String,
    pub icon_url: String,
}

/// Public profile of a forum user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct User {
    pub id: String,
    pub name: String,
    pub post_num: u32,
    /// Registration time in seconds since Unix epoch.
    pub reg_date: u64,
}

/// Topic (thread) summary as shown in topic lists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Topic {
    pub id: String,
    pub subject: String,
    pub author_id: String,
    pub author_name: String,
    pub replies_num: u32,
    /// Last reply time in seconds since Unix epoch.
    pub last_post_date: u64,
}

/// Composite post identity: topic id plus post id within the topic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct PostId {
    pub tid: String,
    pub pid: String,
}

impl PostId {
    pub fn new(tid: impl Into<String>, pid: impl Into<String>) -> Self {
        Self {
            tid: tid.into(),
            pid: pid.into(),
        }
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.tid, self.pid)
    }
}

/// Vote state of the current user on a post.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum VoteState {
    #[default]
    None,
    Up,
    Down,
}

/// Vote action requested by the user.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VoteOperation {
    Upvote,
    Downvote,
}

/// Full post as shown in topic details.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Post {
    pub id: PostId,
    /// Floor number within the topic, starting at 0 for the opening post.
    pub floor: u32,
    pub author_id: String,
    pub content: String,
    pub vote_score: i32,
    pub vote_state: VoteState,
    /// Topic page the post lives on.
    pub at_page: u32,
    pub post_date: u64,
}

/// Reduced post payload used by cross-topic lists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct LightPost {
    pub id: PostId,
    pub content: String,
    pub post_date: u64,
}

/// A post together with the topic it belongs to (user profile post tab).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TopicWithLightPost {
    pub topic: Topic,
    pub post: LightPost,
}

/// One parsed fragment of post markup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Span {
    Plain { text: String },
    Bold { text: String },
    Quote { text: String },
    Link { url: String, text: String },
    Sticker { name: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ForumListRequest {}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TopicListRequest {
    pub forum_id: String,
    /// 1-based page number.
    pub page: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TopicDetailsRequest {
    pub topic_id: String,
    /// 1-based page number.
    pub page: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct UserTopicListRequest {
    pub author_id: String,
    /// 1-based page number.
    pub page: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct UserPostListRequest {
    pub author_id: String,
    /// 1-based page number.
    pub page: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PostVoteRequest {
    pub post_id: PostId,
    pub operation: VoteOperation,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct LocalUserRequest {
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ContentParseRequest {
    /// Raw post markup.
    pub raw: String,
}

/// Request accepted by the logic backend. One variant per operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", content = "payload", rename_all = "snake_case")]
pub enum Request {
    ForumList(ForumListRequest),
    TopicList(TopicListRequest),
    TopicDetails(TopicDetailsRequest),
    UserTopicList(UserTopicListRequest),
    UserPostList(UserPostListRequest),
    PostVote(PostVoteRequest),
    LocalUser(LocalUserRequest),
    ContentParse(ContentParseRequest),
}

impl Request {
    pub fn operation(&self) -> Operation {
        match self {
            Self::ForumList(_) => Operation::ForumList,
            Self::TopicList(_) => Operation::TopicList,
            Self::TopicDetails(_) => Operation::TopicDetails,
            Self::UserTopicList(_) => Operation::UserTopicList,
            Self::UserPostList(_) => Operation::UserPostList,
            Self::PostVote(_) => Operation::PostVote,
            Self::LocalUser(_) => Operation::LocalUser,
            Self::ContentParse(_) => Operation::ContentParse,
        }
    }

    /// Page number for paged operations.
    pub fn page(&self) -> Option<u32> {
        match self {
            Self::TopicList(req) => Some(req.page),
            Self::TopicDetails(req) => Some(req.page),
            Self::UserTopicList(req) => Some(req.page),
            Self::UserPostList(req) => Some(req.page),
            Self::ForumList(_) | Self::PostVote(_) | Self::LocalUser(_) | Self::ContentParse(_) => {
                None
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ForumListResponse {
    pub forums: Vec<Forum>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TopicListResponse {
    pub topics: Vec<Topic>,
    /// Total page count reported by the backend.
    pub pages: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TopicDetailsResponse {
    pub topic: Option<Topic>,
    pub replies: Vec<Post>,
    pub pages: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct UserTopicListResponse {
    pub topics: Vec<Topic>,
    pub pages: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorMessage>,
}

/// Posts authored by a user. The backend reports no page count for this list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct UserPostListResponse {
    pub posts: Vec<TopicWithLightPost>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PostVoteResponse {
    pub state: VoteState,
    /// Score change caused by this vote.
    pub delta: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct LocalUserResponse {
    pub user: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ContentParseResponse {
    pub spans: Vec<Span>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorMessage>,
}

/// Response emitted by the logic backend, mirroring [`Request`] tags.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", content = "payload", rename_all = "snake_case")]
pub enum Response {
    ForumList(ForumListResponse),
    TopicList(TopicListResponse),
    TopicDetails(TopicDetailsResponse),
    UserTopicList(UserTopicListResponse),
    UserPostList(UserPostListResponse),
    PostVote(PostVoteResponse),
    LocalUser(LocalUserResponse),
    ContentParse(ContentParseResponse),
}

impl Response {
    pub fn operation(&self) -> Operation {
        match self {
            Self::ForumList(_) => Operation::ForumList,
            Self::TopicList(_) => Operation::TopicList,
            Self::TopicDetails(_) => Operation::TopicDetails,
            Self::UserTopicList(_) => Operation::UserTopicList,
            Self::UserPostList(_) => Operation::UserPostList,
            Self::PostVote(_) => Operation::PostVote,
            Self::LocalUser(_) => Operation::LocalUser,
            Self::ContentParse(_) => Operation::ContentParse,
        }
    }

    /// Domain error carried by the payload, if any.
    pub fn error(&self) -> Option<&ErrorMessage> {
        match self {
            Self::ForumList(payload) => payload.error.as_ref(),
            Self::TopicList(payload) => payload.error.as_ref(),
            Self::TopicDetails(payload) => payload.error.as_ref(),
            Self::UserTopicList(payload) => payload.error.as_ref(),
            Self::UserPostList(payload) => payload.error.as_ref(),
            Self::PostVote(payload) => payload.error.as_ref(),
            Self::LocalUser(payload) => payload.error.as_ref(),
            Self::ContentParse(payload) => payload.error.as_ref(),
        }
    }
}

/// Typed view of one [`Response`] variant.
///
/// Callers name the payload type they expect; the dispatcher uses this trait
/// to pull the matching variant out of a decoded response and to inspect the
/// payload's domain error.
pub trait ResponsePayload: Sized + Send + 'static {
    /// Operation whose response carries this payload.
    const OPERATION: Operation;

    /// Extract the payload, handing the response back on tag mismatch.
    fn from_response(response: Response) -> Result<Self, Response>;

    /// Domain error carried by the payload, if any.
    fn error(&self) -> Option<&ErrorMessage>;
}

macro_rules! operation_pairs {
    ($($variant:ident => $request:ty, $response:ty;)*) => {
        $(
            impl From<$request> for Request {
                fn from(request: $request) -> Self {
                    Self::$variant(request)
                }
            }

            impl ResponsePayload for $response {
                const OPERATION: Operation = Operation::$variant;

                fn from_response(response: Response) -> Result<Self, Response> {
                    match response {
                        Response::$variant(payload) => Ok(payload),
                        other => Err(other),
                    }
                }

                fn error(&self) -> Option<&ErrorMessage> {
                    self.error.as_ref()
                }
            }
        )*
    };
}

operation_pairs! {
    ForumList => ForumListRequest, ForumListResponse;
    TopicList => TopicListRequest, TopicListResponse;
    TopicDetails => TopicDetailsRequest, TopicDetailsResponse;
    UserTopicList => UserTopicListRequest, UserTopicListResponse;
    UserPostList => UserPostListRequest, UserPostListResponse;
    PostVote => PostVoteRequest, PostVoteResponse;
    LocalUser => LocalUserRequest, LocalUserResponse;
    ContentParse => ContentParseRequest, ContentParseResponse;
}
