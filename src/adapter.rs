use std::{fmt, sync::Arc};

use tokio::time::sleep;

use crate::{
    retry::{AttemptOutcome, MaxRetries, RetryPolicy},
    transport::{PreparedRequest, Transport},
    Error, Response, Result,
};

/// Sends requests through a [`Transport`], retrying transient failures.
///
/// Mounted on a [`Session`](crate::Session) per URL prefix.
pub struct RetryAdapter {
    transport: Arc<dyn Transport>,
    max_retries: MaxRetries,
}

impl fmt::Debug for RetryAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAdapter")
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl RetryAdapter {
    /// Creates an adapter; a bare count gets the idempotent-only defaults.
    pub fn new(transport: Arc<dyn Transport>, max_retries: impl Into<MaxRetries>) -> Self {
        Self {
            transport,
            max_retries: max_retries.into().resolve(RetryPolicy::idempotent),
        }
    }

    pub fn max_retries(&self) -> &MaxRetries {
        &self.max_retries
    }

    /// Sends one logical request, which may take several physical attempts.
    ///
    /// A shared policy receives the advanced state once the request finishes, whether
    /// it succeeded or not.
    pub async fn send(&self, request: &PreparedRequest) -> Result<Response> {
        let mut retries = self.max_retries.current(RetryPolicy::idempotent);
        let result = self.send_with_retries(request, &mut retries).await;

        if let MaxRetries::Shared(shared) = &self.max_retries {
            shared.store(retries);
        }
        result
    }

    async fn send_with_retries(
        &self,
        request: &PreparedRequest,
        retries: &mut RetryPolicy,
    ) -> Result<Response> {
        let mut attempt = 1usize;
        loop {
            let retry_after;
            let next = match self.transport.send(request).await {
                Ok(response) => {
                    retry_after = response.retry_after();
                    let status = response.status().as_u16();
                    let next = retries
                        .is_retry(&request.method, status, retry_after.is_some())
                        .then(|| {
                            retries.increment(
                                &request.method,
                                &request.url,
                                AttemptOutcome::Status(status),
                            )
                        })
                        .flatten();
                    match next {
                        Some(next) => next,
                        None if retries.is_exhausted_on(&request.method, status) => {
                            tracing::warn!(
                                method = %request.method,
                                url = %request.url,
                                attempts = attempt,
                                status,
                                "giving up after retries"
                            );
                            return Err(Error::RetriesExhausted {
                                status,
                                url: request.url.clone(),
                                attempts: attempt,
                            });
                        }
                        None => return Ok(response),
                    }
                }
                Err(err) => {
                    retry_after = None;
                    let next = retries
                        .is_retryable_error(&request.method, &err)
                        .then(|| {
                            retries.increment(
                                &request.method,
                                &request.url,
                                AttemptOutcome::Error(err.to_string()),
                            )
                        })
                        .flatten();
                    match next {
                        Some(next) => next,
                        None => {
                            if err.is_transient() && attempt > 1 {
                                tracing::warn!(
                                    method = %request.method,
                                    url = %request.url,
                                    attempts = attempt,
                                    error = %err,
                                    "giving up after retries"
                                );
                            }
                            return Err(err);
                        }
                    }
                }
            };
            *retries = next;

            let delay = retries.sleep_duration(retry_after);
            tracing::debug!(
                method = %request.method,
                url = %request.url,
                attempt,
                remaining = retries.total(),
                delay_ms = delay.as_millis() as u64,
                "retrying request"
            );
            sleep(delay).await;
            attempt += 1;
        }
    }
}
