//! resend sender entry point.

mod args;
mod progress;

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use resend_transfer::{SenderSession, TransferError, connect};
use tracing_subscriber::EnvFilter;

use args::Args;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr so they don't fight the progress bar; quiet by default.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(args))
}

async fn run(args: Args) -> anyhow::Result<()> {
    let name = args
        .transfer_name()
        .with_context(|| format!("cannot derive a transfer name from {}", args.file.display()))?;

    tracing::debug!(host = %args.host, port = args.port, %name, file = %args.file.display(), "sending");

    let pb = progress::bar(&name, args.quiet);
    let result = send(&args, &name, pb.clone()).await;
    match &result {
        Ok(_) => pb.finish(),
        Err(_) => pb.abandon(),
    }

    let report = result.map_err(|e| {
        let kind = e.kind();
        anyhow::Error::new(e).context(format!("transfer of {name} failed ({kind})"))
    })?;

    if !args.quiet {
        println!(
            "{}: {} bytes ({} resumed, {} sent)",
            report.name, report.size, report.resumed_from, report.sent
        );
    }
    Ok(())
}

async fn send(
    args: &Args,
    name: &str,
    pb: indicatif::ProgressBar,
) -> Result<resend_transfer::SendReport, TransferError> {
    let mut stream = connect(&args.host, args.port, Duration::from_secs(args.timeout)).await?;
    let mut session =
        SenderSession::new(name, args.file.clone()).with_progress(progress::callback(pb));
    session.run(&mut stream).await
}
