use std::{
    collections::{BTreeSet, HashSet},
    fmt,
    sync::{Arc, Mutex, OnceLock, PoisonError},
    time::Duration,
};

use rand::Rng as _;
use reqwest::Method;
use serde::Deserialize;

use crate::{Error, Result};

/// Statuses that are worth another attempt: 408, 429, 500, 502, 503 and 504.
///
/// 429 and 503 may carry a `Retry-After` header.
pub const TRANSIENT_ERRORS: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Methods the process default policy retries.
pub const IDEMPOTENT_METHODS: [Method; 3] = [Method::GET, Method::HEAD, Method::OPTIONS];

/// Statuses for which a `Retry-After` header makes a response retryable.
pub const RETRY_AFTER_STATUS_CODES: [u16; 3] = [413, 429, 503];

/// Upper bound applied to every computed sleep.
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(120);

/// Number of retries the process default policy allows.
pub const DEFAULT_TOTAL: u32 = 3;

/// Which HTTP methods a policy may retry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AllowedMethods {
    /// Every method is retryable.
    All,
    /// Only the listed methods are retryable.
    Only(HashSet<Method>),
}

impl AllowedMethods {
    pub fn idempotent() -> Self {
        Self::only(IDEMPOTENT_METHODS)
    }

    pub fn only<I>(methods: I) -> Self
    where
        I: IntoIterator<Item = Method>,
    {
        Self::Only(methods.into_iter().collect())
    }

    pub fn contains(&self, method: &Method) -> bool {
        match self {
            AllowedMethods::All => true,
            AllowedMethods::Only(methods) => methods.contains(method),
        }
    }
}

/// Record of one failed or redirected attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestHistory {
    pub method: Method,
    pub url: String,
    pub error: Option<String>,
    pub status: Option<u16>,
    pub redirect_location: Option<String>,
}

/// What happened on the attempt being recorded by [`RetryPolicy::increment`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// A connection-level error with its message.
    Error(String),
    /// A response whose status triggered a retry.
    Status(u16),
    /// A redirect. Not counted as an error when computing backoff.
    Redirect { status: u16, location: String },
}

/// Retry configuration with full-jitter exponential backoff.
///
/// A policy is a value: [`RetryPolicy::increment`] returns the policy for the next
/// attempt and leaves `self` untouched. Two policies are equal when every field,
/// history included, is equal.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    total: u32,
    status_forcelist: BTreeSet<u16>,
    allowed_methods: AllowedMethods,
    backoff_factor: f64,
    backoff_max: Duration,
    respect_retry_after_header: bool,
    raise_on_status: bool,
    history: Vec<RequestHistory>,
}

impl RetryPolicy {
    /// Creates a policy allowing `total` retries of any method on transient statuses.
    ///
    /// Everything except the attempt count uses the defaults: [`TRANSIENT_ERRORS`],
    /// [`AllowedMethods::All`], a backoff factor of one second and a
    /// [`DEFAULT_BACKOFF_MAX`] ceiling. Running out of retries on a forcelisted status
    /// is an error.
    pub fn new(total: u32) -> Self {
        Self {
            total,
            status_forcelist: TRANSIENT_ERRORS.into_iter().collect(),
            allowed_methods: AllowedMethods::All,
            backoff_factor: 1.0,
            backoff_max: DEFAULT_BACKOFF_MAX,
            respect_retry_after_header: true,
            raise_on_status: true,
            history: Vec::new(),
        }
    }

    /// Creates a policy allowing `total` retries of idempotent methods only.
    pub fn idempotent(total: u32) -> Self {
        Self {
            allowed_methods: AllowedMethods::idempotent(),
            ..Self::new(total)
        }
    }

    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::default()
    }

    /// Returns the process-wide default policy.
    ///
    /// Built once, never mutated: [`DEFAULT_TOTAL`] retries of idempotent methods.
    pub fn process_default() -> Arc<RetryPolicy> {
        static DEFAULT: OnceLock<Arc<RetryPolicy>> = OnceLock::new();
        DEFAULT
            .get_or_init(|| Arc::new(RetryPolicy::idempotent(DEFAULT_TOTAL)))
            .clone()
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn status_forcelist(&self) -> &BTreeSet<u16> {
        &self.status_forcelist
    }

    pub fn allowed_methods(&self) -> &AllowedMethods {
        &self.allowed_methods
    }

    pub fn backoff_factor(&self) -> f64 {
        self.backoff_factor
    }

    pub fn backoff_max(&self) -> Duration {
        self.backoff_max
    }

    pub fn respect_retry_after_header(&self) -> bool {
        self.respect_retry_after_header
    }

    pub fn raise_on_status(&self) -> bool {
        self.raise_on_status
    }

    pub fn history(&self) -> &[RequestHistory] {
        &self.history
    }

    pub fn is_exhausted(&self) -> bool {
        self.total == 0
    }

    pub fn is_method_retryable(&self, method: &Method) -> bool {
        self.allowed_methods.contains(method)
    }

    /// Decides whether a response with `status` to `method` should be retried.
    pub fn is_retry(&self, method: &Method, status: u16, has_retry_after: bool) -> bool {
        if self.is_exhausted() || !self.is_method_retryable(method) {
            return false;
        }
        if self.status_forcelist.contains(&status) {
            return true;
        }
        self.respect_retry_after_header
            && has_retry_after
            && RETRY_AFTER_STATUS_CODES.contains(&status)
    }

    /// Decides whether a response that would have been retried, had any attempts
    /// remained, must be turned into [`Error::RetriesExhausted`].
    pub fn is_exhausted_on(&self, method: &Method, status: u16) -> bool {
        self.raise_on_status
            && self.is_exhausted()
            && self.is_method_retryable(method)
            && self.status_forcelist.contains(&status)
    }

    /// Decides whether a failed attempt of `method` should be retried.
    pub fn is_retryable_error(&self, method: &Method, err: &Error) -> bool {
        !self.is_exhausted() && self.is_method_retryable(method) && err.is_transient()
    }

    /// Returns the policy for the next attempt, or `None` when no retries remain.
    pub fn increment(&self, method: &Method, url: &str, outcome: AttemptOutcome) -> Option<Self> {
        if self.is_exhausted() {
            return None;
        }

        let (error, status, redirect_location) = match outcome {
            AttemptOutcome::Error(message) => (Some(message), None, None),
            AttemptOutcome::Status(status) => (None, Some(status), None),
            AttemptOutcome::Redirect { status, location } => (None, Some(status), Some(location)),
        };

        let mut next = self.clone();
        next.total -= 1;
        next.history.push(RequestHistory {
            method: method.clone(),
            url: url.to_owned(),
            error,
            status,
            redirect_location,
        });
        Some(next)
    }

    /// Number of failures at the tail of the history since the last redirect.
    pub fn consecutive_errors(&self) -> usize {
        self.history
            .iter()
            .rev()
            .take_while(|entry| entry.redirect_location.is_none())
            .count()
    }

    /// Samples the sleep before the next attempt.
    pub fn backoff(&self) -> Duration {
        self.backoff_with(|low, high| rand::thread_rng().gen_range(low..=high))
    }

    /// Computes the sleep before the next attempt using `sample` to draw from
    /// `[low, high]`.
    ///
    /// With `n` consecutive errors the draw covers `[0, 2 * factor * 2^(n-1)]`,
    /// and the result never exceeds the ceiling. No errors means no sleep.
    pub fn backoff_with<F>(&self, sample: F) -> Duration
    where
        F: FnOnce(f64, f64) -> f64,
    {
        let errors = self.consecutive_errors();
        if errors < 1 {
            return Duration::ZERO;
        }

        let exp = (errors - 1).min(63) as i32;
        let base = self.backoff_factor * 2f64.powi(exp);
        let high = (base * 2.0).min(f64::MAX / 2.0);
        if high <= 0.0 {
            return Duration::ZERO;
        }

        let ceiling = self.backoff_max.as_secs_f64();
        let jittered = sample(0.0, high).clamp(0.0, ceiling);
        Duration::try_from_secs_f64(jittered).unwrap_or(self.backoff_max)
    }

    /// Chooses the sleep before the next attempt, honoring `Retry-After` when enabled.
    pub fn sleep_duration(&self, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(delay) if self.respect_retry_after_header => delay.min(self.backoff_max),
            _ => self.backoff(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_TOTAL)
    }
}

/// Validating builder for [`RetryPolicy`].
#[derive(Clone, Debug)]
pub struct RetryPolicyBuilder {
    total: u32,
    status_forcelist: Vec<u16>,
    allowed_methods: AllowedMethods,
    backoff_factor: f64,
    backoff_max: Duration,
    respect_retry_after_header: bool,
    raise_on_status: bool,
}

impl Default for RetryPolicyBuilder {
    fn default() -> Self {
        Self {
            total: DEFAULT_TOTAL,
            status_forcelist: TRANSIENT_ERRORS.to_vec(),
            allowed_methods: AllowedMethods::All,
            backoff_factor: 1.0,
            backoff_max: DEFAULT_BACKOFF_MAX,
            respect_retry_after_header: true,
            raise_on_status: true,
        }
    }
}

impl RetryPolicyBuilder {
    pub fn total(mut self, total: u32) -> Self {
        self.total = total;
        self
    }

    pub fn status_forcelist<I>(mut self, statuses: I) -> Self
    where
        I: IntoIterator<Item = u16>,
    {
        self.status_forcelist = statuses.into_iter().collect();
        self
    }

    pub fn allowed_methods(mut self, methods: AllowedMethods) -> Self {
        self.allowed_methods = methods;
        self
    }

    /// Sets the backoff factor in seconds.
    pub fn backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    pub fn backoff_max(mut self, max: Duration) -> Self {
        self.backoff_max = max;
        self
    }

    pub fn respect_retry_after_header(mut self, respect: bool) -> Self {
        self.respect_retry_after_header = respect;
        self
    }

    /// When `false`, a forcelisted status that arrives with no retries left is returned
    /// as a response instead of [`Error::RetriesExhausted`].
    pub fn raise_on_status(mut self, raise: bool) -> Self {
        self.raise_on_status = raise;
        self
    }

    pub fn build(self) -> Result<RetryPolicy> {
        if !self.backoff_factor.is_finite() || self.backoff_factor < 0.0 {
            return Err(Error::InvalidPolicy(format!(
                "backoff factor must be a finite, non-negative number of seconds, got {}",
                self.backoff_factor
            )));
        }
        if let Some(status) = self
            .status_forcelist
            .iter()
            .find(|status| !(100..=599).contains(*status))
        {
            return Err(Error::InvalidPolicy(format!(
                "status {status} in forcelist is not an HTTP status code"
            )));
        }

        Ok(RetryPolicy {
            total: self.total,
            status_forcelist: self.status_forcelist.into_iter().collect(),
            allowed_methods: self.allowed_methods,
            backoff_factor: self.backoff_factor,
            backoff_max: self.backoff_max,
            respect_retry_after_header: self.respect_retry_after_header,
            raise_on_status: self.raise_on_status,
            history: Vec::new(),
        })
    }
}

/// Serializable form of a retry policy, e.g. loaded from a config file.
///
/// `allowed_methods` accepts the string `"all"` or a list of method names.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    #[serde(default = "default_total")]
    pub total: u32,
    #[serde(default = "default_status_forcelist")]
    pub status_forcelist: Vec<u16>,
    #[serde(default)]
    pub allowed_methods: MethodsConfig,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    #[serde(default = "default_backoff_max_secs")]
    pub backoff_max_secs: f64,
    #[serde(default = "default_true")]
    pub respect_retry_after_header: bool,
    #[serde(default = "default_true")]
    pub raise_on_status: bool,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum MethodsConfig {
    Keyword(String),
    List(Vec<String>),
}

impl Default for MethodsConfig {
    fn default() -> Self {
        MethodsConfig::Keyword("all".to_owned())
    }
}

fn default_total() -> u32 {
    DEFAULT_TOTAL
}

fn default_status_forcelist() -> Vec<u16> {
    TRANSIENT_ERRORS.to_vec()
}

fn default_backoff_factor() -> f64 {
    1.0
}

fn default_backoff_max_secs() -> f64 {
    DEFAULT_BACKOFF_MAX.as_secs_f64()
}

fn default_true() -> bool {
    true
}

impl TryFrom<RetryConfig> for RetryPolicy {
    type Error = Error;

    fn try_from(config: RetryConfig) -> Result<Self> {
        let allowed_methods = match config.allowed_methods {
            MethodsConfig::Keyword(keyword) if keyword.eq_ignore_ascii_case("all") => {
                AllowedMethods::All
            }
            MethodsConfig::Keyword(other) => {
                return Err(Error::InvalidPolicy(format!(
                    "allowed methods must be \"all\" or a list, got \"{other}\""
                )))
            }
            MethodsConfig::List(names) => {
                let methods = names
                    .iter()
                    .map(|name| {
                        Method::from_bytes(name.to_ascii_uppercase().as_bytes()).map_err(|_| {
                            Error::InvalidPolicy(format!("'{name}' is not an HTTP method"))
                        })
                    })
                    .collect::<Result<HashSet<_>>>()?;
                AllowedMethods::Only(methods)
            }
        };
        let backoff_max = Duration::try_from_secs_f64(config.backoff_max_secs).map_err(|_| {
            Error::InvalidPolicy(format!(
                "backoff ceiling must be a finite, non-negative number of seconds, got {}",
                config.backoff_max_secs
            ))
        })?;

        RetryPolicy::builder()
            .total(config.total)
            .status_forcelist(config.status_forcelist)
            .allowed_methods(allowed_methods)
            .backoff_factor(config.backoff_factor)
            .backoff_max(backoff_max)
            .respect_retry_after_header(config.respect_retry_after_header)
            .raise_on_status(config.raise_on_status)
            .build()
    }
}

/// A policy handle shared across calls.
///
/// Each call through a session holding this handle starts from the handle's current
/// state and stores the advanced policy when it finishes, so the retry budget and
/// history carry over from call to call.
#[derive(Clone)]
pub struct SharedRetryPolicy(Arc<Mutex<RetryPolicy>>);

impl SharedRetryPolicy {
    pub fn new(policy: RetryPolicy) -> Self {
        Self(Arc::new(Mutex::new(policy)))
    }

    /// Returns a copy of the current state.
    pub fn snapshot(&self) -> RetryPolicy {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn store(&self, policy: RetryPolicy) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = policy;
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for SharedRetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SharedRetryPolicy")
            .field(&self.snapshot())
            .finish()
    }
}

/// Retry setting accepted by sessions and the convenience functions.
///
/// An integer count builds a fresh policy from the defaults of the place it is used.
/// A policy value is used as given; the same `Arc` ends up in the session.
#[derive(Clone, Debug)]
pub enum MaxRetries {
    Count(u32),
    Policy(Arc<RetryPolicy>),
    Shared(SharedRetryPolicy),
}

impl MaxRetries {
    /// Resolves a count with `defaults`, passing policy values through untouched.
    pub(crate) fn resolve(self, defaults: fn(u32) -> RetryPolicy) -> MaxRetries {
        match self {
            MaxRetries::Count(total) => MaxRetries::Policy(Arc::new(defaults(total))),
            other => other,
        }
    }

    /// Returns the policy a new logical request starts from.
    pub(crate) fn current(&self, defaults: fn(u32) -> RetryPolicy) -> RetryPolicy {
        match self {
            MaxRetries::Count(total) => defaults(*total),
            MaxRetries::Policy(policy) => RetryPolicy::clone(policy),
            MaxRetries::Shared(shared) => shared.snapshot(),
        }
    }
}

impl From<u32> for MaxRetries {
    fn from(total: u32) -> Self {
        MaxRetries::Count(total)
    }
}

impl From<RetryPolicy> for MaxRetries {
    fn from(policy: RetryPolicy) -> Self {
        MaxRetries::Policy(Arc::new(policy))
    }
}

impl From<Arc<RetryPolicy>> for MaxRetries {
    fn from(policy: Arc<RetryPolicy>) -> Self {
        MaxRetries::Policy(policy)
    }
}

impl From<SharedRetryPolicy> for MaxRetries {
    fn from(policy: SharedRetryPolicy) -> Self {
        MaxRetries::Shared(policy)
    }
}

/// `None` means zero retries.
impl<T: Into<MaxRetries>> From<Option<T>> for MaxRetries {
    fn from(value: Option<T>) -> Self {
        value.map_or(MaxRetries::Count(0), Into::into)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use reqwest::Method;

    use super::*;

    const ALL_METHODS: [Method; 7] = [
        Method::GET,
        Method::OPTIONS,
        Method::HEAD,
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
    ];

    fn failed(policy: &RetryPolicy, times: usize) -> RetryPolicy {
        let mut policy = policy.clone();
        for _ in 0..times {
            policy = policy
                .increment(&Method::GET, "https://example.com", AttemptOutcome::Status(503))
                .expect("policy must not be exhausted");
        }
        policy
    }

    #[test]
    fn equal_parameters_compare_equal() {
        assert_eq!(RetryPolicy::new(3), RetryPolicy::new(3));
        assert_eq!(RetryPolicy::default(), RetryPolicy::default());
        assert_ne!(RetryPolicy::new(1), RetryPolicy::new(2));
        assert_ne!(RetryPolicy::new(3), RetryPolicy::idempotent(3));
        assert_ne!(
            RetryPolicy::new(3),
            RetryPolicy::builder().backoff_factor(0.5).build().unwrap()
        );
    }

    #[test]
    fn history_takes_part_in_equality() {
        let policy = RetryPolicy::new(3);
        let advanced = failed(&policy, 1);
        assert_ne!(advanced, RetryPolicy::new(2));
        assert_eq!(advanced, failed(&RetryPolicy::new(3), 1));
    }

    #[test]
    fn backoff_doubles_until_the_ceiling() {
        let mut policies = vec![RetryPolicy::new(9)];
        for _ in 0..9 {
            let next = failed(policies.last().unwrap(), 1);
            policies.push(next);
        }

        let expected_value = |low: f64, high: f64| (low + high) / 2.0;
        let backoffs: Vec<f64> = policies
            .iter()
            .map(|policy| policy.backoff_with(expected_value).as_secs_f64())
            .collect();

        assert_eq!(
            backoffs,
            vec![0.0, 1.0, 2.0, 4.0, 8.0, 16.0, 32.0, 64.0, 120.0, 120.0]
        );
    }

    #[test]
    fn backoff_is_full_jitter() {
        let policy = failed(&RetryPolicy::new(9), 3);

        let draws: Vec<Duration> = (0..10_000).map(|_| policy.backoff()).collect();
        let distinct: HashSet<u128> = draws.iter().map(Duration::as_nanos).collect();
        assert!(distinct.len() > 9_900, "draws must be spread, got {}", distinct.len());
        assert!(draws.iter().all(|draw| *draw <= Duration::from_secs(8)));

        let mean = draws.iter().map(Duration::as_secs_f64).sum::<f64>() / draws.len() as f64;
        assert!(3.5 < mean && mean < 4.5, "mean was {mean}");
    }

    #[test]
    fn redirects_reset_the_backoff_count() {
        let policy = failed(&RetryPolicy::new(9), 3);
        let redirected = policy
            .increment(
                &Method::GET,
                "https://example.com",
                AttemptOutcome::Redirect {
                    status: 301,
                    location: "https://example.com/moved".to_owned(),
                },
            )
            .unwrap();

        assert_eq!(redirected.consecutive_errors(), 0);
        assert_eq!(redirected.backoff(), Duration::ZERO);
        assert_eq!(failed(&redirected, 1).consecutive_errors(), 1);
    }

    #[test]
    fn backoff_max_is_configurable() {
        let policy = RetryPolicy::builder()
            .total(9)
            .backoff_max(Duration::from_secs(5))
            .build()
            .unwrap();
        let policy = failed(&policy, 6);

        assert_eq!(policy.backoff_with(|_, high| high), Duration::from_secs(5));
    }

    #[test]
    fn huge_ceiling_does_not_overflow() {
        let policy = RetryPolicy::builder()
            .total(2)
            .backoff_factor(1e300)
            .backoff_max(Duration::MAX)
            .build()
            .unwrap();
        let policy = failed(&policy, 1);

        assert_eq!(policy.backoff_with(|_, high| high), Duration::MAX);
        assert_eq!(policy.sleep_duration(None), Duration::MAX);
    }

    #[test]
    fn increment_stops_at_zero() {
        let policy = failed(&RetryPolicy::new(2), 2);

        assert_eq!(policy.total(), 0);
        assert!(policy.is_exhausted());
        assert_eq!(policy.history().len(), 2);
        assert!(policy
            .increment(&Method::GET, "https://example.com", AttemptOutcome::Status(503))
            .is_none());
    }

    #[test]
    fn increment_leaves_the_original_untouched() {
        let policy = RetryPolicy::new(3);
        let next = policy
            .increment(
                &Method::POST,
                "https://example.com/upload",
                AttemptOutcome::Error("connection refused".to_owned()),
            )
            .unwrap();

        assert_eq!(policy.total(), 3);
        assert!(policy.history().is_empty());
        assert_eq!(next.total(), 2);
        assert_eq!(
            next.history(),
            &[RequestHistory {
                method: Method::POST,
                url: "https://example.com/upload".to_owned(),
                error: Some("connection refused".to_owned()),
                status: None,
                redirect_location: None,
            }]
        );
    }

    #[test]
    fn default_policy_retries_transient_idempotent_requests() {
        let default = RetryPolicy::process_default();
        assert!(default.total() > 0);
        assert_eq!(*default, RetryPolicy::idempotent(DEFAULT_TOTAL));
        assert!(Arc::ptr_eq(&default, &RetryPolicy::process_default()));

        let created = RetryPolicy::default();
        for method in ALL_METHODS {
            for status in 400..600 {
                let is_transient = TRANSIENT_ERRORS.contains(&status);
                let is_idempotent = IDEMPOTENT_METHODS.contains(&method);
                assert_eq!(
                    created.is_retry(&method, status, false),
                    is_transient,
                    "{method} {status}"
                );
                assert_eq!(
                    default.is_retry(&method, status, false),
                    is_transient && is_idempotent,
                    "{method} {status}"
                );
            }
        }
    }

    #[test]
    fn exhausted_policy_never_retries() {
        let policy = RetryPolicy::new(0);
        assert!(!policy.is_retry(&Method::GET, 503, true));
    }

    #[test]
    fn exhausted_forcelisted_status_raises() {
        let policy = RetryPolicy::new(0);
        assert!(policy.raise_on_status());
        assert!(policy.is_exhausted_on(&Method::POST, 503));
        assert!(!policy.is_exhausted_on(&Method::POST, 404));
        assert!(!RetryPolicy::new(1).is_exhausted_on(&Method::GET, 503));
        assert!(!RetryPolicy::idempotent(0).is_exhausted_on(&Method::POST, 503));

        let lenient = RetryPolicy::builder()
            .total(0)
            .raise_on_status(false)
            .build()
            .unwrap();
        assert!(!lenient.is_exhausted_on(&Method::GET, 503));
    }

    #[test]
    fn retry_after_extends_retryable_statuses() {
        let policy = RetryPolicy::new(1);
        assert!(!policy.is_retry(&Method::PUT, 413, false));
        assert!(policy.is_retry(&Method::PUT, 413, true));
        assert!(!policy.is_retry(&Method::PUT, 404, true));

        let ignoring = RetryPolicy::builder()
            .respect_retry_after_header(false)
            .build()
            .unwrap();
        assert!(!ignoring.is_retry(&Method::PUT, 413, true));
    }

    #[test]
    fn retry_after_replaces_backoff_when_respected() {
        let policy = failed(&RetryPolicy::new(5), 4);
        assert_eq!(
            policy.sleep_duration(Some(Duration::from_secs(3))),
            Duration::from_secs(3)
        );
        assert_eq!(
            policy.sleep_duration(Some(Duration::from_secs(600))),
            DEFAULT_BACKOFF_MAX
        );
    }

    #[test]
    fn builder_rejects_invalid_values() {
        assert!(matches!(
            RetryPolicy::builder().backoff_factor(-1.0).build(),
            Err(Error::InvalidPolicy(_))
        ));
        assert!(matches!(
            RetryPolicy::builder().backoff_factor(f64::NAN).build(),
            Err(Error::InvalidPolicy(_))
        ));
        assert!(matches!(
            RetryPolicy::builder().status_forcelist([503, 1000]).build(),
            Err(Error::InvalidPolicy(_))
        ));
    }

    #[test]
    fn config_defaults_match_new() {
        let config: RetryConfig = serde_json::from_str(r#"{ "total": 5 }"#).unwrap();
        assert_eq!(RetryPolicy::try_from(config).unwrap(), RetryPolicy::new(5));
    }

    #[test]
    fn config_parses_method_list() {
        let config: RetryConfig = serde_json::from_str(
            r#"{
                "total": 2,
                "allowed_methods": ["get", "HEAD"],
                "backoff_factor": 0.5,
                "backoff_max_secs": 30
            }"#,
        )
        .unwrap();
        let policy = RetryPolicy::try_from(config).unwrap();

        assert_eq!(
            policy.allowed_methods(),
            &AllowedMethods::only([Method::GET, Method::HEAD])
        );
        assert_eq!(policy.backoff_factor(), 0.5);
        assert_eq!(policy.backoff_max(), Duration::from_secs(30));
        assert!(policy.raise_on_status());

        let config: RetryConfig =
            serde_json::from_str(r#"{ "raise_on_status": false }"#).unwrap();
        assert!(!RetryPolicy::try_from(config).unwrap().raise_on_status());
    }

    #[test]
    fn config_accepts_all_marker_and_rejects_bad_ceiling() {
        let config: RetryConfig =
            serde_json::from_str(r#"{ "allowed_methods": "all" }"#).unwrap();
        assert_eq!(
            RetryPolicy::try_from(config).unwrap().allowed_methods(),
            &AllowedMethods::All
        );

        let config: RetryConfig =
            serde_json::from_str(r#"{ "backoff_max_secs": -1 }"#).unwrap();
        assert!(matches!(
            RetryPolicy::try_from(config),
            Err(Error::InvalidPolicy(_))
        ));
    }

    #[test]
    fn shared_policy_stores_advanced_state() {
        let shared = SharedRetryPolicy::new(RetryPolicy::new(3));
        let alias = shared.clone();

        let next = failed(&shared.snapshot(), 1);
        shared.store(next.clone());

        assert!(alias.ptr_eq(&shared));
        assert_eq!(alias.snapshot(), next);
    }

    #[test]
    fn none_means_zero_retries() {
        let resolved = MaxRetries::from(None::<u32>).resolve(RetryPolicy::idempotent);
        match resolved {
            MaxRetries::Policy(policy) => assert_eq!(*policy, RetryPolicy::idempotent(0)),
            other => panic!("expected resolved policy, got {other:?}"),
        }
    }
}
