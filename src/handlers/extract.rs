use axum::extract::FromRequest;

use crate::error::AppError;

/// A JSON request body whose rejections answer with the usual `{"message": ...}` body.
#[derive(FromRequest, Debug)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);
