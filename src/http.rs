use std::collections::BTreeSet;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::cli::EngineArgs;

pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(120);
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_factor: f64,
    pub backoff_max: Duration,
    pub retry_statuses: BTreeSet<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff_factor: 0.1,
            backoff_max: DEFAULT_BACKOFF_MAX,
            retry_statuses: [500, 502, 503, 504, 403].into_iter().collect(),
        }
    }
}

impl RetryPolicy {
    pub fn from_args(args: &EngineArgs) -> Self {
        Self {
            max_retries: args.max_retries,
            backoff_factor: args.backoff_factor.max(0.0),
            backoff_max: DEFAULT_BACKOFF_MAX,
            retry_statuses: args.retry_statuses.iter().copied().collect(),
        }
    }

    pub fn is_retryable_status(&self, status: StatusCode) -> bool {
        self.retry_statuses.contains(&status.as_u16())
    }

    pub fn backoff(&self, retry: u32) -> Duration {
        if retry == 0 || self.backoff_factor <= 0.0 {
            return Duration::ZERO;
        }

        let exponent = (retry - 1).min(30) as i32;
        let seconds = self.backoff_factor * 2_f64.powi(exponent);
        Duration::from_secs_f64(seconds.min(self.backoff_max.as_secs_f64()))
    }
}

#[derive(Debug, Clone)]
pub struct HttpSession {
    client: Client,
    policy: RetryPolicy,
}

impl HttpSession {
    pub fn new(timeout: Duration, policy: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { client, policy })
    }

    pub fn from_args(args: &EngineArgs) -> Result<Self> {
        Self::new(
            Duration::from_secs(args.timeout_secs.max(1)),
            RetryPolicy::from_args(args),
        )
    }

    pub fn send<F>(&self, build: F) -> Result<Response>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let mut retry = 0u32;
        loop {
            match build(&self.client).send() {
                Ok(response) => {
                    let status = response.status();
                    if retry < self.policy.max_retries && self.policy.is_retryable_status(status) {
                        retry += 1;
                        let delay = self.policy.backoff(retry);
                        warn!(
                            url = %response.url(),
                            status = status.as_u16(),
                            retry,
                            delay_ms = delay.as_millis() as u64,
                            "retrying request after retryable status"
                        );
                        thread::sleep(delay);
                        continue;
                    }
                    debug!(url = %response.url(), status = status.as_u16(), "request completed");
                    return Ok(response);
                }
                Err(err) if retry < self.policy.max_retries && is_transient(&err) => {
                    retry += 1;
                    let delay = self.policy.backoff(retry);
                    warn!(
                        error = %err,
                        retry,
                        delay_ms = delay.as_millis() as u64,
                        "retrying request after transport error"
                    );
                    thread::sleep(delay);
                }
                Err(err) => return Err(err).context("HTTP request failed"),
            }
        }
    }
}

fn is_transient(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout() || err.is_request()
}
