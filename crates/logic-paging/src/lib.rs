//! Generic incremental pagination for forum list views.
//!
//! Every list (forums, topics, replies, user profile tabs) is a
//! [`PagingSource`] configured with a [`PageSpec`]: how to build the request
//! for a page, how to project the response into items, and how to key them.

/// Identity-keyed item list and merge.
pub mod merge;
/// Page results, page totals and list construction parameters.
pub mod page;
/// Paging phases and allowed transitions.
pub mod phase;
/// Paging source driven by list views.
pub mod source;

pub use merge::{IdentityList, MergeOutcome};
pub use page::{FinishOnError, PageResult, PageSpec, TotalPages};
pub use phase::{Phase, PhaseError, PhaseMachine};
pub use source::{LOAD_MORE_THRESHOLD, PagingSnapshot, PagingSource, UpdateListener};
