use colored::Colorize;
use converge_core::{CancellationToken, Error, PollSettings, run_to_convergence};
use converge_remote::{ControlPlaneClient, RepositoryOnboarding};

pub async fn handle(
    client: &ControlPlaneClient,
    spec: RepositoryOnboarding,
    settings: PollSettings,
) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, no longer waiting");
            on_interrupt.cancel();
        }
    });

    println!(
        "{} {} (timeout {}s)",
        "Onboarding".blue(),
        spec.name.cyan(),
        settings.timeout.as_secs()
    );

    match run_to_convergence(&client.onboarding(), &spec, settings, &cancel).await {
        Ok(status) => {
            println!("{} {} is {}", "✓".green(), spec.name.cyan(), status.to_string().green());
            Ok(())
        }
        Err(Error::Convergence(e)) if e.is_retryable() => {
            eprintln!(
                "{}",
                "The request was accepted and the repository may still connect.".yellow()
            );
            eprintln!("{}", "Check again later or rerun with a larger --timeout.".yellow());
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}
