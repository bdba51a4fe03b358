use std::{fmt::Display, path::PathBuf, time::Duration};

use tracing::{debug, info, warn};

use crate::{
    dns01_client::{Dns01Api, Dns01Client, NewRecord},
    propagation::{PropagationWaiter, Sleeper, SystemResolver, TokioSleeper, TxtResolver},
    state::StateFile,
    Result,
};

pub const CHALLENGE_PREFIX: &str = "_acme-challenge.";
pub const DEFAULT_RECORD_TTL: u32 = 300;
pub const DEFAULT_RECORD_NOTE: &str = "letsencrypt-challenge";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Name of the TXT record holding the DNS-01 validation for `domain`.
///
/// Lowercased without a trailing dot, the form the registrar stores names in.
pub fn challenge_record_name(domain: &str) -> String {
    let domain = domain.trim_end_matches('.').to_ascii_lowercase();
    format!("{CHALLENGE_PREFIX}{domain}")
}

#[allow(clippy::duplicated_attributes)]
#[derive(Clone, bon::Builder)]
#[builder(on(String, into))]
#[builder(on(PathBuf, into))]
pub struct HookConfig {
    api_url: String,
    api_token: String,
    state_file: PathBuf,
    #[builder(default = DEFAULT_POLL_INTERVAL)]
    poll_interval: Duration,
    max_attempts: Option<u32>,
    #[builder(default = DEFAULT_RECORD_TTL)]
    record_ttl: u32,
    #[builder(default = DEFAULT_RECORD_NOTE.to_string())]
    record_note: String,
}

impl HookConfig {
    pub fn build_hook(&self) -> Hook {
        Hook::build(self.clone())
    }
}

/// Result of a step whose failure must not abort the flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BestEffort {
    Done,
    Failed(String),
}

impl BestEffort {
    fn log<E: Display>(what: impl Display, result: std::result::Result<(), E>) -> Self {
        match result {
            Ok(()) => Self::Done,
            Err(err) => {
                warn!("failed to {what}, continuing: {err}");
                Self::Failed(err.to_string())
            }
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgedRecord {
    pub record_id: u64,
    pub result: BestEffort,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOutcome {
    pub domain_id: u64,
    pub record_name: String,
    pub record_id: u64,
    /// Stale challenge records found before creating the new one.
    pub purged: Vec<PurgedRecord>,
    pub persisted: BestEffort,
    /// Number of DNS lookups until the record was visible.
    pub lookups: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupOutcome {
    pub domain_id: u64,
    pub record_id: u64,
    pub state_removed: BestEffort,
}

/// Publishes and withdraws DNS-01 challenge records.
pub struct Hook<A = Dns01Client, R = SystemResolver, S = TokioSleeper> {
    dns01_client: A,
    waiter: PropagationWaiter<R, S>,
    state: StateFile,
    record_ttl: u32,
    record_note: String,
}

impl Hook {
    /// Build a new `Hook` talking to the real registrar and system resolver.
    pub fn build(config: HookConfig) -> Self {
        let dns01_client = Dns01Client::new_r01(config.api_url, config.api_token);
        let waiter =
            PropagationWaiter::system(config.poll_interval).with_max_attempts(config.max_attempts);
        Self::new(dns01_client, waiter, StateFile::new(config.state_file))
            .with_record_template(config.record_ttl, config.record_note)
    }
}

impl<A: Dns01Api, R: TxtResolver, S: Sleeper> Hook<A, R, S> {
    pub fn new(dns01_client: A, waiter: PropagationWaiter<R, S>, state: StateFile) -> Self {
        Self {
            dns01_client,
            waiter,
            state,
            record_ttl: DEFAULT_RECORD_TTL,
            record_note: DEFAULT_RECORD_NOTE.to_string(),
        }
    }

    /// Sets the TTL and note of created challenge records.
    pub fn with_record_template(mut self, ttl: u32, note: impl Into<String>) -> Self {
        self.record_ttl = ttl;
        self.record_note = note.into();
        self
    }

    pub fn state(&self) -> &StateFile {
        &self.state
    }

    /// Publish `validation` at `_acme-challenge.<domain>` and wait until it resolves.
    pub async fn auth(&self, domain: &str, validation: &str) -> Result<AuthOutcome> {
        let record_name = challenge_record_name(domain);
        info!("publishing challenge record {record_name}");

        let domain_id = self.dns01_client.resolve_domain_id(domain).await?;
        debug!("{domain} belongs to registrar domain {domain_id}");

        let purged = self.purge_challenge_records(domain_id, &record_name).await?;

        let record = NewRecord::txt(&record_name, self.record_ttl, validation, &self.record_note);
        let record_id = self.dns01_client.create_record(domain_id, &record).await?;
        info!("created TXT record {record_name} (id {record_id})");

        if self.state.exists() {
            warn!(
                "{} still holds a record id from an earlier challenge, overwriting",
                self.state.path().display()
            );
        }
        let persisted = BestEffort::log(
            format_args!("save record id to {}", self.state.path().display()),
            self.state.save(record_id),
        );

        let lookups = self.waiter.wait(&record_name, validation).await?;

        Ok(AuthOutcome {
            domain_id,
            record_name,
            record_id,
            purged,
            persisted,
            lookups,
        })
    }

    /// Remove the record created by the preceding [`Hook::auth`] run.
    pub async fn cleanup(&self, domain: &str) -> Result<CleanupOutcome> {
        let domain_id = self.dns01_client.resolve_domain_id(domain).await?;
        let record_id = self.state.load()?;
        info!("removing challenge record {record_id} of {domain}");

        self.dns01_client
            .delete_record(domain_id, record_id)
            .await?;

        let state_removed = BestEffort::log(
            format_args!("remove {}", self.state.path().display()),
            self.state.remove(),
        );
        Ok(CleanupOutcome {
            domain_id,
            record_id,
            state_removed,
        })
    }

    /// Deletes every TXT record named `record_name`, ignoring failures.
    async fn purge_challenge_records(
        &self,
        domain_id: u64,
        record_name: &str,
    ) -> Result<Vec<PurgedRecord>> {
        let stale = self
            .dns01_client
            .get_txt_records(domain_id, record_name)
            .await?;
        let mut purged = Vec::with_capacity(stale.len());
        for record in stale {
            debug!("removing stale challenge record {}", record.id);
            let result = self.dns01_client.delete_record(domain_id, record.id).await;
            purged.push(PurgedRecord {
                record_id: record.id,
                result: BestEffort::log(
                    format_args!("remove stale record {}", record.id),
                    result,
                ),
            });
        }
        Ok(purged)
    }
}
