//! Upstream Client — spec.md §4.3: rate-limited, batch-capable adapter to
//! the upstream API, exposing `resolveGroups`, `listPosts`, `listComments`
//! as lazy paged sequences.
//!
//! Shape grounded on `bpmn_integration::client::BpmnLiteConnection`: a
//! cheaply-cloneable connection wrapper with domain-typed methods that hide
//! the wire representation (there: protobuf; here: the upstream JSON API
//! via `reqwest`).

mod classify;
mod client;
mod pager;
mod rate_limiter;

pub use classify::UpstreamErrorKind;
pub use client::{CommentSort, ResolvedGroup, UpstreamClient};
pub use pager::{CommentPager, PostPager};
