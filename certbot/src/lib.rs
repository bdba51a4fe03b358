//! A certbot DNS-01 hook for domains hosted at the R01 registrar.
//!
//! certbot runs the hook twice per challenge, as separate processes:
//!
//! - `--manual-auth-hook`: find the registrar domain that hosts `CERTBOT_DOMAIN`,
//!   drop stale `_acme-challenge` TXT records, publish `CERTBOT_VALIDATION`, remember
//!   the new record id in a scratch file and wait until public DNS serves the value.
//! - `--manual-cleanup-hook`: delete the remembered record and the scratch file.
//!
//! # Usage
//!
//! ```rust,no_run
//! use certbot_r01::HookConfig;
//!
//! # async fn run() -> certbot_r01::Result<()> {
//! let hook = HookConfig::builder()
//!     .api_url("https://api.r01.ru")
//!     .api_token("your_r01_access_token")
//!     .state_file("/tmp/certbot_r01_record_id")
//!     .build()
//!     .build_hook();
//!
//! let outcome = hook.auth("www.example.com", "validation-token").await?;
//! println!("published record {}", outcome.record_id);
//!
//! hook.cleanup("www.example.com").await?;
//! # Ok(())
//! # }
//! ```

pub use config::{Invocation, Mode, Settings};
pub use dns01_client::{Dns01Api, Dns01Client, Domain, NewRecord, Record};
pub use error::{Error, Result};
pub use hook::{AuthOutcome, BestEffort, CleanupOutcome, Hook, HookConfig, PurgedRecord};
pub use propagation::{PropagationWaiter, Sleeper, SystemResolver, TokioSleeper, TxtResolver};
pub use state::StateFile;

pub mod config;
pub mod dns01_client;
pub mod hook;
pub mod propagation;
pub mod state;

mod error;
