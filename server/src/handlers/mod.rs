use axum::extract::FromRequest;

use crate::error::Error;

pub mod links;
pub mod redirect;

/// `axum::Json` whose rejections come back as the API's JSON error body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(Error))]
pub struct JsonBody<T>(pub T);
