use std::fmt;

use logic_core::Request;

/// Total page count as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TotalPages {
    Known(u32),
    #[default]
    Unknown,
}

impl TotalPages {
    /// Whether `current_page` is the last page there is.
    pub fn is_reached(self, current_page: u32) -> bool {
        match self {
            Self::Known(total) => current_page >= total,
            Self::Unknown => false,
        }
    }
}

/// One page projected out of a typed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResult<T> {
    pub items: Vec<T>,
    pub total_pages: TotalPages,
}

impl<T> PageResult<T> {
    pub fn new(items: Vec<T>, total_pages: TotalPages) -> Self {
        Self { items, total_pages }
    }
}

/// When a list counts as exhausted instead of merely loaded or failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FinishOnError {
    /// Only a reached known total exhausts the list.
    #[default]
    Disabled,
    /// A fetch that appends no new item also exhausts the list.
    OnEmptyPage,
    /// As `OnEmptyPage`, and a failed fetch past the first page ends the list
    /// instead of failing it.
    OnEmptyPageOrTrailingError,
}

impl FinishOnError {
    pub fn finishes_on_empty(self) -> bool {
        !matches!(self, Self::Disabled)
    }

    pub fn finishes_on_trailing_error(self) -> bool {
        matches!(self, Self::OnEmptyPageOrTrailingError)
    }
}

type BuildRequest = dyn Fn(u32) -> Request + Send + Sync;
type Project<R, T> = dyn Fn(R) -> PageResult<T> + Send + Sync;
type IdentityKey<T, K> = dyn Fn(&T) -> K + Send + Sync;

/// The behavioral parameters of one paged list.
pub struct PageSpec<R, T, K> {
    pub(crate) build_request: Box<BuildRequest>,
    pub(crate) on_response: Box<Project<R, T>>,
    pub(crate) id: Box<IdentityKey<T, K>>,
    pub(crate) finish_on_error: FinishOnError,
}

impl<R, T, K> PageSpec<R, T, K> {
    /// `build_request` maps a 1-based page number to a request,
    /// `on_response` projects the typed response into a page, and `id`
    /// yields each item's identity key.
    pub fn new<B, Q, P, I>(build_request: B, on_response: P, id: I) -> Self
    where
        B: Fn(u32) -> Q + Send + Sync + 'static,
        Q: Into<Request>,
        P: Fn(R) -> PageResult<T> + Send + Sync + 'static,
        I: Fn(&T) -> K + Send + Sync + 'static,
    {
        Self {
            build_request: Box::new(move |page| -> Request { build_request(page).into() }),
            on_response: Box::new(on_response),
            id: Box::new(id),
            finish_on_error: FinishOnError::default(),
        }
    }

    pub fn finish_on_error(mut self, policy: FinishOnError) -> Self {
        self.finish_on_error = policy;
        self
    }

    pub fn finish_policy(&self) -> FinishOnError {
        self.finish_on_error
    }

    pub fn request_for(&self, page: u32) -> Request {
        (self.build_request)(page)
    }
}

impl<R, T, K> fmt::Debug for PageSpec<R, T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageSpec")
            .field("finish_on_error", &self.finish_on_error)
            .finish_non_exhaustive()
    }
}
