use std::{fmt, path::PathBuf, sync::Arc, time::Duration};

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::{retry::MaxRetries, Response, Result};

/// Connect and read timeout applied to each physical attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Timeout {
    /// Connect and read share one duration.
    Uniform(Duration),
    /// Separate connect and read durations.
    Split { connect: Duration, read: Duration },
}

impl Timeout {
    pub fn connect(&self) -> Duration {
        match *self {
            Timeout::Uniform(duration) => duration,
            Timeout::Split { connect, .. } => connect,
        }
    }

    pub fn read(&self) -> Duration {
        match *self {
            Timeout::Uniform(duration) => duration,
            Timeout::Split { read, .. } => read,
        }
    }
}

impl From<Duration> for Timeout {
    fn from(duration: Duration) -> Self {
        Timeout::Uniform(duration)
    }
}

impl From<(Duration, Duration)> for Timeout {
    fn from((connect, read): (Duration, Duration)) -> Self {
        Timeout::Split { connect, read }
    }
}

/// Default `(connect, read)` timeout.
pub const DEFAULT_TIMEOUT: Timeout = Timeout::Split {
    connect: Duration::from_millis(6_100),
    read: Duration::from_secs(54),
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum TimeoutSetting {
    /// Use the session timeout.
    #[default]
    Inherit,
    /// Wait forever.
    Disabled,
    Custom(Timeout),
}

impl TimeoutSetting {
    pub(crate) fn resolve(self, session: Option<Timeout>) -> Option<Timeout> {
        match self {
            TimeoutSetting::Inherit => session,
            TimeoutSetting::Disabled => None,
            TimeoutSetting::Custom(timeout) => Some(timeout),
        }
    }
}

/// Request body.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Body {
    #[default]
    Empty,
    Bytes(Bytes),
    Form(Vec<(String, String)>),
    Json(serde_json::Value),
}

#[derive(Clone, PartialEq, Eq)]
pub enum Auth {
    Basic {
        username: String,
        password: Option<String>,
    },
    Bearer(String),
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Auth::Bearer(_) => f.debug_tuple("Bearer").field(&"<redacted>").finish(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProxyScope {
    Http,
    Https,
    All,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProxyRule {
    pub scope: ProxyScope,
    pub url: String,
}

/// Server certificate verification.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Verify {
    #[default]
    Enabled,
    Disabled,
    /// Verify against the PEM bundle at this path in addition to the built-in roots.
    CaBundle(PathBuf),
}

/// Client certificate for mutual TLS.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientCert {
    /// One PEM file holding both the certificate chain and the private key.
    Pem(PathBuf),
    /// Separate certificate and key PEM files.
    Pair { cert: PathBuf, key: PathBuf },
}

/// Parameters forwarded unmodified to the [`Transport`](crate::Transport).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RequestParams {
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    pub body: Body,
    pub auth: Option<Auth>,
    pub proxies: Vec<ProxyRule>,
    pub verify: Verify,
    pub cert: Option<ClientCert>,
    /// Unset means the method default decides.
    pub allow_redirects: Option<bool>,
}

/// A hook run on the final response of a request.
pub type ResponseHook = Arc<dyn Fn(Response) -> Result<Response> + Send + Sync>;

/// Per-call options.
///
/// `timeout`, `max_retries` and hooks are consumed by this crate; everything else is
/// carried in [`RequestParams`] and reaches the transport untouched.
#[derive(Clone, Default)]
pub struct RequestOptions {
    pub(crate) timeout: TimeoutSetting,
    pub(crate) max_retries: Option<MaxRetries>,
    pub(crate) hooks: Vec<ResponseHook>,
    pub(crate) params: RequestParams,
}

impl fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("hooks", &self.hooks.len())
            .field("params", &self.params)
            .finish()
    }
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the timeout for this call.
    pub fn timeout(mut self, timeout: impl Into<Timeout>) -> Self {
        self.timeout = TimeoutSetting::Custom(timeout.into());
        self
    }

    /// Waits forever for this call.
    pub fn no_timeout(mut self) -> Self {
        self.timeout = TimeoutSetting::Disabled;
        self
    }

    /// Sets the retry behavior of a convenience call.
    ///
    /// Accepts a count, a [`RetryPolicy`](crate::RetryPolicy), a shared policy, or
    /// `None` for no retries.
    pub fn max_retries(mut self, max_retries: impl Into<MaxRetries>) -> Self {
        self.max_retries = Some(max_retries.into());
        self
    }

    pub fn hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(Response) -> Result<Response> + Send + Sync + 'static,
    {
        self.hooks.push(Arc::new(hook));
        self
    }

    /// Turns 4XX and 5XX final responses into errors, logging the body first.
    pub fn raise_for_status(self) -> Self {
        self.hook(crate::hooks::raise_for_status)
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.params.headers.append(name, value);
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.params.headers.extend(headers);
        self
    }

    pub fn query<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.params
            .query
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Sends raw bytes as the body.
    pub fn data(mut self, body: impl Into<Bytes>) -> Self {
        self.params.body = Body::Bytes(body.into());
        self
    }

    /// Sends url-encoded form fields as the body.
    pub fn form<K, V>(mut self, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.params.body = Body::Form(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    pub fn json(mut self, value: serde_json::Value) -> Self {
        self.params.body = Body::Json(value);
        self
    }

    pub fn basic_auth(mut self, username: impl Into<String>, password: Option<String>) -> Self {
        self.params.auth = Some(Auth::Basic {
            username: username.into(),
            password,
        });
        self
    }

    pub fn bearer_auth(mut self, token: impl Into<String>) -> Self {
        self.params.auth = Some(Auth::Bearer(token.into()));
        self
    }

    pub fn proxy(mut self, scope: ProxyScope, url: impl Into<String>) -> Self {
        self.params.proxies.push(ProxyRule {
            scope,
            url: url.into(),
        });
        self
    }

    pub fn verify(mut self, verify: Verify) -> Self {
        self.params.verify = verify;
        self
    }

    pub fn cert(mut self, cert: ClientCert) -> Self {
        self.params.cert = Some(cert);
        self
    }

    pub fn allow_redirects(mut self, allow: bool) -> Self {
        self.params.allow_redirects = Some(allow);
        self
    }

    /// Removes and returns the retry setting.
    pub(crate) fn take_max_retries(&mut self) -> Option<MaxRetries> {
        self.max_retries.take()
    }

    pub(crate) fn allow_redirects_or(mut self, default: bool) -> Self {
        self.params.allow_redirects.get_or_insert(default);
        self
    }
}
