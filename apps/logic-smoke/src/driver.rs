//! Smoke scenario: one-shot calls plus every paged list walked to its end.
//!
//! The task running [`run`] plays the foreground context. It owns the
//! [`ForegroundLoop`] and pumps it while background fetches complete.

use std::{hash::Hash, sync::Arc, time::Duration};

use logic_core::{
    ContentParseRequest, ContentParseResponse, DispatchError, Dispatcher, DomainErrorPolicy,
    ForegroundLoop, ForumListRequest, ForumListResponse, LocalUserRequest, LocalUserResponse,
    Post, PostId, PostVoteRequest, PostVoteResponse, ResponsePayload, RetryPolicy, Topic,
    TopicDetailsRequest, TopicDetailsResponse, TopicListRequest, TopicListResponse,
    TopicWithLightPost, UserPostListRequest, UserPostListResponse, UserTopicListRequest,
    UserTopicListResponse, VoteOperation,
};
use logic_paging::{FinishOnError, PageResult, PageSpec, PagingSource, Phase, TotalPages};
use thiserror::Error;
use tokio::{runtime::Handle, sync::oneshot};
use tracing::{debug, info, warn};

use crate::{config::SmokeConfig, fake_backend::FakeForum};

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);
const SAMPLE_MARKUP: &str = "[quote]楼上说得对[/quote][b]同意[/b] [s:ac:blink]";

/// Outcome of a successful smoke run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SmokeReport {
    pub user_name: Option<String>,
    pub forums: usize,
    pub spans: usize,
    pub vote_delta: i32,
    pub topics: usize,
    pub replies: usize,
    pub user_topics: usize,
    pub user_posts: usize,
    pub retries: u32,
}

#[derive(Debug, Error)]
pub enum SmokeError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error("{0} produced no result")]
    NoResult(&'static str),
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
    #[error("foreground loop closed while waiting for {0}")]
    ForegroundClosed(&'static str),
    #[error("background task failed: {0}")]
    Background(String),
    #[error("{list} still failing after {retries} retries: {error}")]
    RetriesExhausted {
        list: &'static str,
        retries: u32,
        error: DispatchError,
    },
    #[error("{list} stopped in unexpected phase {phase}")]
    UnexpectedPhase { list: &'static str, phase: Phase },
}

pub async fn run(config: &SmokeConfig) -> Result<SmokeReport, SmokeError> {
    let (mut foreground, handle) = ForegroundLoop::new();
    let transport = Arc::new(
        FakeForum::new(config.pages, config.page_size, config.fail_page).into_transport(),
    );
    let dispatcher = Dispatcher::new(transport, config.context.clone(), Handle::current(), handle);
    let mut report = SmokeReport::default();

    let user_id = config
        .context
        .auth
        .as_ref()
        .map_or_else(|| "0".to_owned(), |auth| auth.uid.clone());
    let blocking = dispatcher.clone();
    let local_user = tokio::task::spawn_blocking(move || {
        blocking.call::<LocalUserResponse>(
            LocalUserRequest { user_id },
            DomainErrorPolicy::Surface,
        )
    })
    .await
    .map_err(|err| SmokeError::Background(err.to_string()))??;
    report.user_name = local_user.user.map(|user| user.name);
    info!(user = ?report.user_name, "local user resolved");

    let (forums_tx, forums_rx) = oneshot::channel();
    dispatcher.call_async(
        ForumListRequest {},
        DomainErrorPolicy::Surface,
        move |response: ForumListResponse| {
            let _ = forums_tx.send(response);
        },
    );
    pump(&mut foreground, "forum list").await?;
    let forums = forums_rx
        .await
        .map_err(|_| SmokeError::NoResult("forum list"))?
        .forums;
    report.forums = forums.len();
    let forum_id = forums
        .first()
        .map(|forum| forum.id.clone())
        .ok_or(SmokeError::NoResult("forum list"))?;

    let (spans_tx, spans_rx) = oneshot::channel();
    dispatcher.call_async(
        ContentParseRequest {
            raw: SAMPLE_MARKUP.to_owned(),
        },
        DomainErrorPolicy::Surface,
        move |response: ContentParseResponse| {
            let _ = spans_tx.send(response.spans.len());
        },
    );
    pump(&mut foreground, "content parse").await?;
    report.spans = spans_rx
        .await
        .map_err(|_| SmokeError::NoResult("content parse"))?;

    let topics = PagingSource::new(dispatcher.clone(), topic_list_spec(forum_id));
    topics.on_update(|snapshot| {
        debug!(
            items = snapshot.items.len(),
            page = snapshot.current_page,
            phase = %snapshot.phase,
            "topic list updated"
        );
    });
    report.topics = drain(
        "topic list",
        &topics,
        &mut foreground,
        config.retry,
        &mut report.retries,
    )
    .await?;
    let topic_id = topics
        .items()
        .first()
        .map(|topic| topic.id.clone())
        .ok_or(SmokeError::NoResult("topic list"))?;

    let replies = PagingSource::new(dispatcher.clone(), topic_details_spec(topic_id));
    report.replies = drain(
        "topic replies",
        &replies,
        &mut foreground,
        config.retry,
        &mut report.retries,
    )
    .await?;
    if replies.reload_page(1) {
        pump(&mut foreground, "reply page reload").await?;
    }
    if let Some(post) = replies.items().first() {
        report.vote_delta = vote_twice(&dispatcher, &mut foreground, post.id.clone()).await?;
    }

    let user_topics = PagingSource::new(dispatcher.clone(), user_topic_list_spec("1000"));
    report.user_topics = drain(
        "user topics",
        &user_topics,
        &mut foreground,
        config.retry,
        &mut report.retries,
    )
    .await?;

    let user_posts = PagingSource::new(dispatcher.clone(), user_post_list_spec("1000"));
    report.user_posts = drain(
        "user posts",
        &user_posts,
        &mut foreground,
        config.retry,
        &mut report.retries,
    )
    .await?;

    if topics.refresh() {
        pump(&mut foreground, "topic list refresh").await?;
        info!(phase = %topics.phase(), items = topics.len(), "topic list refreshed");
    }

    Ok(report)
}

/// Upvote the same post twice; the second vote is rejected by the backend
/// and ignored by call policy.
async fn vote_twice(
    dispatcher: &Dispatcher,
    foreground: &mut ForegroundLoop,
    post_id: PostId,
) -> Result<i32, SmokeError> {
    let mut delta = 0;
    for _ in 0..2 {
        let (tx, rx) = oneshot::channel();
        dispatcher.try_call_async(
            PostVoteRequest {
                post_id: post_id.clone(),
                operation: VoteOperation::Upvote,
            },
            DomainErrorPolicy::Ignore,
            move |result: Result<PostVoteResponse, DispatchError>| {
                let _ = tx.send(result);
            },
        );
        pump(foreground, "post vote").await?;
        let response = rx.await.map_err(|_| SmokeError::NoResult("post vote"))??;
        if let Some(error) = &response.error {
            info!(post = %post_id, info = %error.info, "vote rejected by backend");
        }
        delta += response.delta;
    }
    Ok(delta)
}

/// Walk a list from its first page to its end, retrying failed pages with
/// backoff. Returns the final item count.
async fn drain<R, T, K>(
    list: &'static str,
    source: &PagingSource<R, T, K>,
    foreground: &mut ForegroundLoop,
    retry: RetryPolicy,
    retries: &mut u32,
) -> Result<usize, SmokeError>
where
    R: ResponsePayload,
    T: Clone + Send + 'static,
    K: Eq + Hash + Send + 'static,
{
    let mut attempt = 0;
    if !source.initial_load() {
        return Err(SmokeError::UnexpectedPhase {
            list,
            phase: source.phase(),
        });
    }

    loop {
        pump(foreground, list).await?;
        match source.phase() {
            Phase::Loaded => {
                attempt = 0;
                let issued = source
                    .items()
                    .last()
                    .is_some_and(|last| source.load_more_if_needed(last))
                    || source.load_more();
                if !issued {
                    return Err(SmokeError::UnexpectedPhase {
                        list,
                        phase: source.phase(),
                    });
                }
            }
            Phase::Exhausted => {
                info!(
                    list,
                    items = source.len(),
                    pages = source.current_page(),
                    "list exhausted"
                );
                return Ok(source.len());
            }
            Phase::Failed => {
                let error = source.last_error().ok_or(SmokeError::NoResult(list))?;
                let Some(delay) = retry.delay_for(&error, attempt) else {
                    return Err(SmokeError::RetriesExhausted {
                        list,
                        retries: attempt,
                        error,
                    });
                };
                warn!(
                    list,
                    attempt,
                    delay = ?delay,
                    code = error.code(),
                    "retrying failed page"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                *retries += 1;
                source.retry();
            }
            phase => return Err(SmokeError::UnexpectedPhase { list, phase }),
        }
    }
}

/// Run exactly one foreground task.
async fn pump(foreground: &mut ForegroundLoop, what: &'static str) -> Result<(), SmokeError> {
    match tokio::time::timeout(DELIVERY_TIMEOUT, foreground.run_next()).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(SmokeError::ForegroundClosed(what)),
        Err(_) => Err(SmokeError::Timeout(what)),
    }
}

fn known_total(pages: u32) -> TotalPages {
    if pages == 0 {
        TotalPages::Unknown
    } else {
        TotalPages::Known(pages)
    }
}

fn topic_list_spec(forum_id: String) -> PageSpec<TopicListResponse, Topic, String> {
    PageSpec::new(
        move |page| TopicListRequest {
            forum_id: forum_id.clone(),
            page,
        },
        |response: TopicListResponse| {
            PageResult::new(response.topics, known_total(response.pages))
        },
        |topic: &Topic| topic.id.clone(),
    )
}

fn topic_details_spec(topic_id: String) -> PageSpec<TopicDetailsResponse, Post, PostId> {
    PageSpec::new(
        move |page| TopicDetailsRequest {
            topic_id: topic_id.clone(),
            page,
        },
        |response: TopicDetailsResponse| {
            PageResult::new(response.replies, known_total(response.pages))
        },
        |post: &Post| post.id.clone(),
    )
    .finish_on_error(FinishOnError::OnEmptyPage)
}

fn user_topic_list_spec(author_id: &str) -> PageSpec<UserTopicListResponse, Topic, String> {
    let author_id = author_id.to_owned();
    PageSpec::new(
        move |page| UserTopicListRequest {
            author_id: author_id.clone(),
            page,
        },
        |response: UserTopicListResponse| {
            PageResult::new(response.topics, known_total(response.pages))
        },
        |topic: &Topic| topic.id.clone(),
    )
    .finish_on_error(FinishOnError::OnEmptyPage)
}

fn user_post_list_spec(
    author_id: &str,
) -> PageSpec<UserPostListResponse, TopicWithLightPost, PostId> {
    let author_id = author_id.to_owned();
    PageSpec::new(
        move |page| UserPostListRequest {
            author_id: author_id.clone(),
            page,
        },
        |response: UserPostListResponse| PageResult::new(response.posts, TotalPages::Unknown),
        |entry: &TopicWithLightPost| entry.post.id.clone(),
    )
    .finish_on_error(FinishOnError::OnEmptyPageOrTrailingError)
}
