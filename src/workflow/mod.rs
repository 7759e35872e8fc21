//! Workflow operations over a [`Store`](crate::db::Store). Handlers and tests
//! call these; none of them touch HTTP types.

pub mod capture;
pub mod directory;
pub mod intake;
pub mod tracker;
