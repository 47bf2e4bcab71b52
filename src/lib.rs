//! `rerequests` is an HTTP convenience layer over `reqwest` with timeouts by default
//! and jittered retries.
//!
//! One-shot helpers mirror the HTTP methods:
//! - [`get`], [`options`], [`head`], [`post`], [`put`], [`patch`], [`delete`]
//!
//! They use [`DEFAULT_TIMEOUT`] and no retries unless [`RequestOptions::max_retries`]
//! says otherwise. A long-lived [`Session`] defaults to three retries of idempotent
//! requests instead.
//!
//! ```no_run
//! # async fn run() -> rerequests::Result<()> {
//! use std::time::Duration;
//!
//! use rerequests::{RequestOptions, RetryPolicy};
//!
//! rerequests::get("https://example.com", RequestOptions::new()).await?;
//! rerequests::post("https://example.com", RequestOptions::new().max_retries(10u32)).await?;
//! rerequests::put(
//!     "https://example.com",
//!     RequestOptions::new()
//!         .max_retries(RetryPolicy::builder().total(5).backoff_factor(0.5).build()?)
//!         .timeout((Duration::from_millis(3_050), Duration::from_secs(27))),
//! )
//! .await?;
//! rerequests::delete("https://example.com", RequestOptions::new().raise_for_status()).await?;
//! # Ok(())
//! # }
//! ```

mod adapter;
mod api;
mod error;
pub mod hooks;
mod options;
mod response;
mod retry;
mod session;
mod transport;

pub use adapter::RetryAdapter;
pub use api::{delete, get, head, options, patch, post, put, request, request_with};
pub use error::Error;
pub use options::{
    Auth, Body, ClientCert, ProxyRule, ProxyScope, RequestOptions, RequestParams, ResponseHook,
    Timeout, Verify, DEFAULT_TIMEOUT,
};
pub use response::Response;
pub use retry::{
    AllowedMethods, AttemptOutcome, MaxRetries, MethodsConfig, RequestHistory, RetryConfig,
    RetryPolicy, RetryPolicyBuilder, SharedRetryPolicy, DEFAULT_BACKOFF_MAX, DEFAULT_TOTAL,
    IDEMPOTENT_METHODS, RETRY_AFTER_STATUS_CODES, TRANSIENT_ERRORS,
};
pub use session::{Session, SessionConfig};
pub use transport::{PreparedRequest, ReqwestTransport, Transport, MAX_REDIRECTS};

pub use reqwest::{header, Method, StatusCode};

pub type Result<T> = std::result::Result<T, Error>;
