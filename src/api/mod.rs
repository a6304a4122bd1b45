//! Controller Contract — spec.md §6. HTTP surface over `TaskService`.

mod response;
mod routes;

pub use response::{Envelope, ErrorBody, Pagination};
pub use routes::{build_router, AppState};
