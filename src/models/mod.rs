//! Data models for the See My Clicks capture store.
//!
//! Field names serialize in camelCase so the JSON document matches what the in-page
//! script and downstream consumers read.

mod capture;
mod requests;
mod session;
mod store;

pub use capture::*;
pub use requests::*;
pub use session::*;
pub use store::*;
