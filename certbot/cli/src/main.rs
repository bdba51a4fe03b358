use anyhow::{Context, Result};
use certbot_r01::{Error, Invocation, Mode, Settings};
use clap::Parser;
use tracing::info;

/// certbot DNS-01 hook for domains hosted at R01.
///
/// Reads CERTBOT_DOMAIN and CERTBOT_VALIDATION from certbot, the registrar token from
/// R01_ACCESS_TOKEN, and optional settings from /etc/certbot-r01/hook.toml.
#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// Publish the challenge TXT record (use as --manual-auth-hook)
    #[arg(long)]
    auth: bool,
    /// Remove the challenge TXT record (use as --manual-cleanup-hook)
    #[arg(long)]
    cleanup: bool,
}

async fn run(invocation: &Invocation, settings: &Settings) -> certbot_r01::Result<()> {
    let hook = settings.hook_config().build_hook();
    match invocation {
        Invocation::Auth { domain, validation } => {
            let outcome = hook.auth(domain, validation).await?;
            info!(
                "challenge record {} (id {}) is live",
                outcome.record_name, outcome.record_id
            );
        }
        Invocation::Cleanup { domain } => {
            let outcome = hook.cleanup(domain).await?;
            info!("removed challenge record {}", outcome.record_id);
        }
    }
    Ok(())
}

fn failure_context(invocation: &Invocation, err: &Error) -> String {
    let action = match invocation {
        Invocation::Auth { .. } => "publish",
        Invocation::Cleanup { .. } => "remove",
    };
    let domain = invocation.domain();
    if err.is_api() {
        format!("failed to {action} challenge for {domain}: registrar request failed")
    } else {
        format!("failed to {action} challenge for {domain}")
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    {
        use tracing_subscriber::{fmt, EnvFilter};
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let args = Args::parse();
    let mode = Mode::from_flags(args.auth, args.cleanup)?;
    let invocation = Invocation::from_env(mode)?;
    let settings = Settings::load().context("failed to load settings")?;
    run(&invocation, &settings).await.map_err(|err| {
        let context = failure_context(&invocation, &err);
        anyhow::Error::new(err).context(context)
    })
}
