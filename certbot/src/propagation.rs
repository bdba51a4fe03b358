//! Waiting for a TXT record to become visible in public DNS.

use std::time::Duration;

use hickory_resolver::{
    error::{ResolveError, ResolveErrorKind},
    TokioAsyncResolver,
};
use tracing::{debug, info, warn};

use crate::{Error, Result};

/// Looks up TXT records.
#[allow(async_fn_in_trait)]
pub trait TxtResolver {
    /// Returns the TXT strings published at `name`.
    ///
    /// A name without TXT records yields an empty list rather than an error.
    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, ResolveError>;
}

#[allow(async_fn_in_trait)]
pub trait Sleeper {
    async fn sleep(&self, duration: Duration);
}

/// Resolver built from the system configuration (`/etc/resolv.conf`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl TxtResolver for SystemResolver {
    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, ResolveError> {
        // A fresh resolver per lookup, so a cached negative answer never hides the new record.
        let resolver = TokioAsyncResolver::tokio_from_system_conf()?;
        let fqdn = format!("{}.", name.trim_end_matches('.'));
        match resolver.txt_lookup(fqdn).await {
            Ok(lookup) => Ok(lookup.iter().map(|txt| txt.to_string()).collect()),
            Err(err) => match err.kind() {
                ResolveErrorKind::NoRecordsFound { .. } => Ok(vec![]),
                _ => Err(err),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await
    }
}

/// Polls DNS until a TXT record carries the expected value.
#[derive(Debug, Clone)]
pub struct PropagationWaiter<R = SystemResolver, S = TokioSleeper> {
    resolver: R,
    sleeper: S,
    poll_interval: Duration,
    max_attempts: Option<u32>,
}

impl PropagationWaiter {
    pub fn system(poll_interval: Duration) -> Self {
        Self::new(SystemResolver, TokioSleeper, poll_interval)
    }
}

impl<R: TxtResolver, S: Sleeper> PropagationWaiter<R, S> {
    /// Creates a waiter that polls forever.
    pub fn new(resolver: R, sleeper: S, poll_interval: Duration) -> Self {
        Self {
            resolver,
            sleeper,
            poll_interval,
            max_attempts: None,
        }
    }

    /// Gives up after `max_attempts` lookups. `None` polls forever.
    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Blocks until one of the TXT strings at `name` equals `expected`.
    ///
    /// Lookup failures are logged and retried like a missing record. Returns the
    /// number of lookups it took.
    pub async fn wait(&self, name: &str, expected: &str) -> Result<u32> {
        info!("waiting for TXT record {name} to propagate");
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match self.resolver.lookup_txt(name).await {
                Ok(values) if values.iter().any(|value| value == expected) => {
                    info!(attempts, "TXT record {name} is visible");
                    return Ok(attempts);
                }
                Ok(values) => {
                    debug!(attempts, found = values.len(), "expected value not in {name}");
                }
                Err(err) => {
                    warn!(attempts, "failed to lookup TXT record {name}: {err}");
                }
            }
            if let Some(max_attempts) = self.max_attempts {
                if attempts >= max_attempts {
                    return Err(Error::PropagationTimeout {
                        name: name.to_string(),
                        attempts,
                    });
                }
            }
            info!(
                attempts,
                "TXT record {name} not found yet, retrying in {:?}", self.poll_interval
            );
            self.sleeper.sleep(self.poll_interval).await;
        }
    }
}
