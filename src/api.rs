//! One-shot request helpers.
//!
//! Each call builds a throwaway [`Session`] with [`DEFAULT_TIMEOUT`](crate::DEFAULT_TIMEOUT)
//! and the call's retry setting, sends one logical request and drops the session.
//! Unlike a long-lived [`Session`], calls are not retried unless `max_retries` is
//! given, and a bare count retries every method.

use std::sync::Arc;

use reqwest::Method;

use crate::{
    session::Session,
    transport::{ReqwestTransport, Transport},
    RequestOptions, Response, Result,
};

/// Sends a request through a fresh session.
pub async fn request(method: Method, url: &str, options: RequestOptions) -> Result<Response> {
    request_with(Arc::new(ReqwestTransport::new()), method, url, options).await
}

/// Like [`request`], over a caller-provided transport.
pub async fn request_with(
    transport: Arc<dyn Transport>,
    method: Method,
    url: &str,
    mut options: RequestOptions,
) -> Result<Response> {
    let session = Session::for_convenience_api(transport, &mut options);
    session.request(method, url, options).await
}

/// Sends a GET request. Redirects are followed unless disabled.
pub async fn get(url: &str, options: RequestOptions) -> Result<Response> {
    request(Method::GET, url, options.allow_redirects_or(true)).await
}

/// Sends an OPTIONS request. Redirects are followed unless disabled.
pub async fn options(url: &str, options: RequestOptions) -> Result<Response> {
    request(Method::OPTIONS, url, options.allow_redirects_or(true)).await
}

/// Sends a HEAD request. Redirects are not followed unless enabled.
pub async fn head(url: &str, options: RequestOptions) -> Result<Response> {
    request(Method::HEAD, url, options.allow_redirects_or(false)).await
}

/// Sends a POST request; set the body with [`RequestOptions::data`],
/// [`RequestOptions::form`] or [`RequestOptions::json`].
pub async fn post(url: &str, options: RequestOptions) -> Result<Response> {
    request(Method::POST, url, options).await
}

pub async fn put(url: &str, options: RequestOptions) -> Result<Response> {
    request(Method::PUT, url, options).await
}

pub async fn patch(url: &str, options: RequestOptions) -> Result<Response> {
    request(Method::PATCH, url, options).await
}

pub async fn delete(url: &str, options: RequestOptions) -> Result<Response> {
    request(Method::DELETE, url, options).await
}
