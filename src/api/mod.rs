//! HTTP handlers for the capture endpoint.
//!
//! Bodies follow the in-page script's contract: the store is returned bare, mutations
//! answer with small camelCase objects, and failures use the JSON error body from
//! [`crate::errors`].

mod captures;

pub use captures::*;

use axum::Json;

use crate::errors::AppError;

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<Json<T>, AppError>;
