//! In-process forum backend answering every logic operation.
//!
//! Paged lists deliberately overlap by one item between consecutive pages so
//! the merge path is exercised, and one configured page fails once with a
//! transient error.

use std::{collections::HashSet, sync::Mutex};

use logic_core::{
    ContentParseResponse, ErrorMessage, Forum, ForumListResponse, LightPost, LocalUserResponse,
    MockTransport, Post, PostId, PostVoteResponse, Request, RequestEnvelope, Response, Span,
    Topic, TopicDetailsResponse, TopicListResponse, TopicWithLightPost, TransportError, User,
    UserPostListResponse, UserTopicListResponse, VoteOperation, VoteState,
};
use tracing::{debug, info};

/// Returned past the end of lists without a page count.
const NO_MORE_RESULTS: &str = "没有符合条件的结果";
const ALREADY_VOTED: &str = "已经投过票了";
const BASE_DATE: u64 = 1_640_000_000;

const FORUMS: &[(&str, &str)] = &[
    ("-7", "网事杂谈"),
    ("310", "二次元国家地理"),
    ("-152678", "晴风村"),
    ("436", "消费电子"),
];

#[derive(Debug)]
pub struct FakeForum {
    pages: u32,
    page_size: usize,
    fail_page: Option<u32>,
    failed_once: Mutex<HashSet<(&'static str, u32)>>,
    votes: Mutex<HashSet<PostId>>,
}

impl FakeForum {
    pub fn new(pages: u32, page_size: usize, fail_page: Option<u32>) -> Self {
        Self {
            pages,
            page_size: page_size.max(1),
            fail_page,
            failed_once: Mutex::new(HashSet::new()),
            votes: Mutex::new(HashSet::new()),
        }
    }

    pub fn into_transport(self) -> MockTransport {
        info!(
            pages = self.pages,
            page_size = self.page_size,
            fail_page = ?self.fail_page,
            "fake forum backend ready"
        );
        MockTransport::new(move |envelope| self.handle(envelope))
    }

    pub fn handle(&self, envelope: &RequestEnvelope) -> Result<Response, TransportError> {
        debug!(
            call_id = %envelope.call_id,
            operation = %envelope.request.operation(),
            page = ?envelope.request.page(),
            "fake backend received request"
        );

        let response = match &envelope.request {
            Request::ForumList(_) => Response::ForumList(ForumListResponse {
                forums: FORUMS
                    .iter()
                    .map(|(id, name)| Forum {
                        id: (*id).to_owned(),
                        name: (*name).to_owned(),
                        info: String::new(),
                        icon_url: format!("{}/icon/{id}.png", envelope.context.base_url),
                    })
                    .collect(),
                error: None,
            }),
            Request::TopicList(req) => {
                self.maybe_fail("topic_list", req.page)?;
                Response::TopicList(TopicListResponse {
                    topics: self
                        .page_indices(req.page)
                        .map(|n| topic(&req.forum_id, n))
                        .collect(),
                    pages: self.pages,
                    error: None,
                })
            }
            Request::TopicDetails(req) => {
                self.maybe_fail("topic_details", req.page)?;
                Response::TopicDetails(TopicDetailsResponse {
                    topic: Some(Topic {
                        id: req.topic_id.clone(),
                        subject: format!("topic {}", req.topic_id),
                        ..Topic::default()
                    }),
                    replies: self
                        .page_indices(req.page)
                        .map(|floor| reply(&req.topic_id, floor, req.page))
                        .collect(),
                    pages: self.pages,
                    error: None,
                })
            }
            Request::UserTopicList(req) => {
                self.maybe_fail("user_topic_list", req.page)?;
                Response::UserTopicList(UserTopicListResponse {
                    topics: self
                        .page_indices(req.page)
                        .map(|n| Topic {
                            author_id: req.author_id.clone(),
                            ..topic("user", n)
                        })
                        .collect(),
                    pages: self.pages,
                    error: None,
                })
            }
            Request::UserPostList(req) => {
                self.maybe_fail("user_post_list", req.page)?;
                let posts: Vec<_> = self
                    .page_indices(req.page)
                    .map(|n| light_post(&req.author_id, n))
                    .collect();
                let error = posts
                    .is_empty()
                    .then(|| ErrorMessage::new("0", NO_MORE_RESULTS));
                Response::UserPostList(UserPostListResponse { posts, error })
            }
            Request::PostVote(req) => {
                let mut votes = self
                    .votes
                    .lock()
                    .map_err(|_| TransportError::Protocol("vote ledger poisoned".to_owned()))?;
                if votes.insert(req.post_id.clone()) {
                    let (state, delta) = match req.operation {
                        VoteOperation::Upvote => (VoteState::Up, 1),
                        VoteOperation::Downvote => (VoteState::Down, -1),
                    };
                    Response::PostVote(PostVoteResponse {
                        state,
                        delta,
                        error: None,
                    })
                } else {
                    Response::PostVote(PostVoteResponse {
                        error: Some(ErrorMessage::new("1", ALREADY_VOTED)),
                        ..PostVoteResponse::default()
                    })
                }
            }
            Request::LocalUser(req) => Response::LocalUser(LocalUserResponse {
                user: Some(User {
                    id: req.user_id.clone(),
                    name: format!("user{}", req.user_id),
                    post_num: 42,
                    reg_date: BASE_DATE,
                }),
                error: None,
            }),
            Request::ContentParse(req) => Response::ContentParse(ContentParseResponse {
                spans: parse_markup(&req.raw),
                error: None,
            }),
        };
        Ok(response)
    }

    /// Item indices of `page`, repeating the last index of the previous page.
    fn page_indices(&self, page: u32) -> std::ops::Range<usize> {
        if page == 0 || page > self.pages {
            return 0..0;
        }
        let start = (page as usize - 1) * self.page_size;
        let end = start + self.page_size;
        start.saturating_sub(1)..end
    }

    fn maybe_fail(&self, list: &'static str, page: u32) -> Result<(), TransportError> {
        if self.fail_page != Some(page) {
            return Ok(());
        }
        let mut failed = self
            .failed_once
            .lock()
            .map_err(|_| TransportError::Protocol("failure ledger poisoned".to_owned()))?;
        if failed.insert((list, page)) {
            debug!(list, page, "injecting transient failure");
            return Err(TransportError::Connection(format!(
                "injected failure for {list} page {page}"
            )));
        }
        Ok(())
    }
}

fn topic(scope: &str, n: usize) -> Topic {
    Topic {
        id: format!("{scope}-{n}"),
        subject: format!("subject {n}"),
        author_id: format!("{}", 1_000 + n),
        author_name: format!("author{n}"),
        replies_num: (n as u32) * 3,
        last_post_date: BASE_DATE + n as u64 * 60,
    }
}

fn reply(topic_id: &str, floor: usize, page: u32) -> Post {
    Post {
        id: PostId::new(topic_id, format!("{}", 10_000 + floor)),
        floor: floor as u32,
        author_id: format!("{}", 2_000 + floor),
        content: format!("[b]floor {floor}[/b] reply"),
        vote_score: 0,
        vote_state: VoteState::None,
        at_page: page,
        post_date: BASE_DATE + floor as u64 * 30,
    }
}

fn light_post(author_id: &str, n: usize) -> TopicWithLightPost {
    let topic = Topic {
        author_id: author_id.to_owned(),
        ..topic("post", n / 2)
    };
    TopicWithLightPost {
        post: LightPost {
            id: PostId::new(topic.id.clone(), format!("{}", 30_000 + n)),
            content: format!("post {n}"),
            post_date: BASE_DATE + n as u64,
        },
        topic,
    }
}

/// Minimal markup parser: `[b]`, `[quote]`, `[url]` and `[s:...]` stickers.
fn parse_markup(raw: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut rest = raw;
    while !rest.is_empty() {
        let Some(open) = rest.find('[') else {
            spans.push(Span::Plain {
                text: rest.to_owned(),
            });
            break;
        };
        if open > 0 {
            spans.push(Span::Plain {
                text: rest[..open].to_owned(),
            });
            rest = &rest[open..];
        }

        if let Some((span, consumed)) = parse_tag(rest) {
            spans.push(span);
            rest = &rest[consumed..];
        } else {
            let next = rest[1..].find('[').map_or(rest.len(), |idx| idx + 1);
            spans.push(Span::Plain {
                text: rest[..next].to_owned(),
            });
            rest = &rest[next..];
        }
    }
    spans
}

fn parse_tag(input: &str) -> Option<(Span, usize)> {
    if let Some(body) = input.strip_prefix("[s:") {
        let end = body.find(']')?;
        let name = body[..end].to_owned();
        return Some((Span::Sticker { name }, 3 + end + 1));
    }

    for tag in ["b", "quote", "url"] {
        let open = format!("[{tag}]");
        let close = format!("[/{tag}]");
        let Some(body) = input.strip_prefix(open.as_str()) else {
            continue;
        };
        let end = body.find(close.as_str())?;
        let text = body[..end].to_owned();
        let span = match tag {
            "b" => Span::Bold { text },
            "quote" => Span::Quote { text },
            _ => Span::Link {
                url: text.clone(),
                text,
            },
        };
        return Some((span, open.len() + end + close.len()));
    }
    None
}
