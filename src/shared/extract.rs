use axum::extract::FromRequest;

use super::AppError;

/// JSON body extractor whose rejections render as the failure envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);
