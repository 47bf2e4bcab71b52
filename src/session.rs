use std::{fmt, sync::Arc};

use reqwest::Method;

use crate::{
    adapter::RetryAdapter,
    options::{RequestOptions, Timeout, DEFAULT_TIMEOUT},
    retry::{MaxRetries, RetryPolicy},
    transport::{PreparedRequest, ReqwestTransport, Transport},
    Error, Response, Result,
};

/// Configures a [`Session`].
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Timeout for requests that do not set their own. `None` waits forever.
    pub timeout: Option<Timeout>,
    /// A bare count gets the idempotent-only defaults.
    pub max_retries: MaxRetries,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_TIMEOUT),
            max_retries: MaxRetries::Policy(RetryPolicy::process_default()),
        }
    }
}

/// Binds a timeout and retry adapters to a transport.
///
/// `http://` and `https://` share one [`RetryAdapter`]; more specific prefixes can
/// be mounted with [`Session::mount`].
pub struct Session {
    timeout: Option<Timeout>,
    adapters: Vec<(String, Arc<RetryAdapter>)>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("timeout", &self.timeout)
            .field("adapters", &self.adapters)
            .finish()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Creates a session with [`DEFAULT_TIMEOUT`] and the process default retry policy.
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default(), Arc::new(ReqwestTransport::new()))
    }

    pub fn with_config(config: SessionConfig, transport: Arc<dyn Transport>) -> Self {
        let adapter = Arc::new(RetryAdapter::new(transport, config.max_retries));
        let mut session = Self {
            timeout: config.timeout,
            adapters: Vec::new(),
        };
        session.mount("https://", Arc::clone(&adapter));
        session.mount("http://", adapter);
        session
    }

    /// Builds the throwaway session behind a convenience call.
    ///
    /// Takes `max_retries` out of `options`. Without one the call is not retried.
    pub(crate) fn for_convenience_api(
        transport: Arc<dyn Transport>,
        options: &mut RequestOptions,
    ) -> Self {
        let max_retries = options
            .take_max_retries()
            .unwrap_or(MaxRetries::Count(0))
            .resolve(RetryPolicy::new);
        Self::with_config(
            SessionConfig {
                timeout: Some(DEFAULT_TIMEOUT),
                max_retries,
            },
            transport,
        )
    }

    pub fn timeout(&self) -> Option<Timeout> {
        self.timeout
    }

    /// Mounts `adapter` for URLs starting with `prefix`. The longest prefix wins.
    pub fn mount(&mut self, prefix: impl Into<String>, adapter: Arc<RetryAdapter>) {
        let prefix = prefix.into().to_ascii_lowercase();
        self.adapters.retain(|(existing, _)| *existing != prefix);
        self.adapters.push((prefix, adapter));
        self.adapters.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()));
    }

    pub fn adapter_for(&self, url: &str) -> Result<&Arc<RetryAdapter>> {
        let lowered = url.to_ascii_lowercase();
        self.adapters
            .iter()
            .find(|(prefix, _)| lowered.starts_with(prefix.as_str()))
            .map(|(_, adapter)| adapter)
            .ok_or_else(|| Error::NoAdapter(url.to_owned()))
    }

    /// Sends a request and runs its hooks on the final response.
    ///
    /// The retry policy belongs to the session: options carrying `max_retries` are
    /// rejected.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        options: RequestOptions,
    ) -> Result<Response> {
        if options.max_retries.is_some() {
            return Err(Error::InvalidOptions(
                "max_retries is set on the session, not per request".to_owned(),
            ));
        }

        let adapter = self.adapter_for(url)?;
        let request = PreparedRequest {
            method,
            url: url.to_owned(),
            timeout: options.timeout.resolve(self.timeout),
            params: options.params,
        };

        let mut response = adapter.send(&request).await?;
        for hook in &options.hooks {
            response = hook(response)?;
        }
        Ok(response)
    }

    /// Sends a GET request, following redirects unless told otherwise.
    pub async fn get(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::GET, url, options.allow_redirects_or(true)).await
    }
}
