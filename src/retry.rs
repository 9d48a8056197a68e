use std::thread;
use std::time::Duration;

/// Bounded retry loop with linear backoff. One request is in flight at a
/// time; the only timer is the backoff sleep between attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_retries: usize,
    base_delay: Duration,
}

/// Outcome of a single attempt, as classified by the caller.
pub enum Attempt<T> {
    Done(T),
    Retry(String),
    Fail(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError {
    /// A retryable failure persisted through every allowed attempt.
    Exhausted { attempts: usize, message: String },
    /// A failure that is not worth retrying (bad request, TLS error).
    Fatal { message: String },
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: usize, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_retries + 1
    }

    pub fn delay_for(&self, attempt: usize) -> Duration {
        self.base_delay * (attempt as u32 + 1)
    }

    /// Drive `op` until it succeeds, fails fatally, or retries are
    /// exhausted. The closure receives the zero-based attempt number.
    pub fn run<T, F>(&self, mut op: F) -> Result<T, RetryError>
    where
        F: FnMut(usize) -> Attempt<T>,
    {
        let mut attempt = 0usize;
        loop {
            match op(attempt) {
                Attempt::Done(value) => return Ok(value),
                Attempt::Fail(message) => return Err(RetryError::Fatal { message }),
                Attempt::Retry(message) => {
                    if attempt >= self.max_retries {
                        return Err(RetryError::Exhausted {
                            attempts: attempt + 1,
                            message,
                        });
                    }
                    thread::sleep(self.delay_for(attempt));
                    attempt += 1;
                }
            }
        }
    }

    /// Send an HTTP request with retries on transient failures. A response
    /// with a non-retryable error status is returned as-is for the caller
    /// to turn into a status error.
    pub fn send<F>(&self, mut make_req: F) -> Result<reqwest::blocking::Response, RetryError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        self.run(|_| match make_req().send() {
            Ok(response) => {
                let status = response.status().as_u16();
                if is_retryable_status(status) {
                    Attempt::Retry(format!("status {status}"))
                } else {
                    Attempt::Done(response)
                }
            }
            Err(err) => {
                if is_retryable_error(&err) {
                    Attempt::Retry(err.to_string())
                } else {
                    Attempt::Fail(err.to_string())
                }
            }
        })
    }
}

pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

pub fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_delay(max_retries: usize) -> RetryPolicy {
        RetryPolicy::new(max_retries, Duration::ZERO)
    }

    #[test]
    fn backoff_schedule_is_linear() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_millis(200));
        assert_eq!(policy.delay_for(1), Duration::from_millis(400));
        assert_eq!(policy.delay_for(2), Duration::from_millis(600));
    }

    #[test]
    fn succeeds_after_transient_failures() {
        let mut calls = 0usize;
        let result = no_delay(3).run(|attempt| {
            calls += 1;
            if attempt < 2 {
                Attempt::Retry("timeout".to_string())
            } else {
                Attempt::Done(attempt)
            }
        });
        assert_eq!(result, Ok(2));
        assert_eq!(calls, 3);
    }

    #[test]
    fn exhausts_after_bounded_attempts() {
        let mut calls = 0usize;
        let result: Result<(), _> = no_delay(3).run(|_| {
            calls += 1;
            Attempt::Retry("status 503".to_string())
        });
        assert_eq!(calls, 4);
        assert_eq!(
            result,
            Err(RetryError::Exhausted {
                attempts: 4,
                message: "status 503".to_string()
            })
        );
    }

    #[test]
    fn fatal_failures_do_not_retry() {
        let mut calls = 0usize;
        let result: Result<(), _> = no_delay(3).run(|_| {
            calls += 1;
            Attempt::Fail("tls handshake".to_string())
        });
        assert_eq!(calls, 1);
        assert_eq!(
            result,
            Err(RetryError::Fatal {
                message: "tls handshake".to_string()
            })
        );
    }

    #[test]
    fn retryable_status_classification() {
        for status in [429, 500, 502, 503, 504] {
            assert!(is_retryable_status(status));
        }
        for status in [200, 204, 400, 403, 404] {
            assert!(!is_retryable_status(status));
        }
    }
}
