//! copilot-session CLI entry point.

mod cli;

use clap::Parser;
use cli::{Cli, Command};
use color_eyre::eyre::{bail, eyre};
use copilot_session::{
    AppBuilder, AttemptStatus, AuthState, ClientEvent, ExternalIdentity, RunningApp,
    SessionSnapshot, StaticAuthProvider,
};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    info!("copilot-session v{}", env!("CARGO_PKG_VERSION"));

    let config = cli.to_config()?;

    let auth_state = match &cli.command {
        Command::Whoami { user_id } => AuthState::signed_in(ExternalIdentity::new(user_id)),
        Command::Verify { .. } | Command::Logout => AuthState::signed_out(),
    };
    let auth = Arc::new(StaticAuthProvider::new(auth_state));
    let mut app = AppBuilder::new(config).with_auth(auth).build().await?;

    match cli.command {
        Command::Whoami { .. } => whoami(&app).await?,
        Command::Verify { tx_hash } => verify(&mut app, &tx_hash).await?,
        Command::Logout => logout(&mut app).await,
    }

    app.shutdown();
    Ok(())
}

async fn whoami(app: &RunningApp) -> color_eyre::Result<()> {
    print_snapshot("cached", &app.session())?;

    app.sync_identity();
    let mut session_rx = app.subscribe_session();
    let fresh = session_rx
        .wait_for(|snapshot| !snapshot.is_validating)
        .await
        .map_err(|_| eyre!("session cache closed"))?
        .clone();

    print_snapshot("fresh", &fresh)
}

async fn verify(app: &mut RunningApp, tx_hash: &str) -> color_eyre::Result<()> {
    let mut events = app
        .events()
        .ok_or_else(|| eyre!("event channel already taken"))?;
    app.register_verification(tx_hash)?;

    // The toast comes from the poller and the finished event from a
    // forwarder task; wait for both.
    let mut finished = None;
    let mut notified = false;
    while finished.is_none() || !notified {
        match events.recv().await {
            Ok(event) => {
                print_event(&event);
                match event {
                    ClientEvent::Success(_) | ClientEvent::Failure(_) => notified = true,
                    ClientEvent::VerificationFinished { status, .. } => finished = Some(status),
                    ClientEvent::Navigated { .. } | ClientEvent::VerificationStarted { .. } => {}
                }
            }
            Err(RecvError::Lagged(skipped)) => warn!("Skipped {skipped} client events"),
            Err(RecvError::Closed) => bail!("client event channel closed"),
        }
    }

    if finished == Some(AttemptStatus::Succeeded) {
        return Ok(());
    }
    let attempts = app
        .verification_status()
        .map_or(0, |attempt| attempt.attempt_count);
    bail!("transaction {tx_hash} not verified after {attempts} attempts")
}

async fn logout(app: &mut RunningApp) {
    let events = app.events();
    app.logout().await;

    if let Some(mut events) = events {
        while let Ok(event) = events.try_recv() {
            print_event(&event);
        }
    }
}

fn print_snapshot(label: &str, snapshot: &SessionSnapshot) -> color_eyre::Result<()> {
    let user = match &snapshot.user {
        Some(user) => serde_json::to_string_pretty(user)?,
        None => "none".to_string(),
    };
    println!(
        "{label}: loading={} validating={}\n{user}",
        snapshot.is_loading, snapshot.is_validating
    );
    Ok(())
}

fn print_event(event: &ClientEvent) {
    match event {
        ClientEvent::Navigated { route, replace } => {
            println!("navigate {route}{}", if *replace { " (replace)" } else { "" });
        }
        ClientEvent::Success(notification) => {
            println!("{}: {}", notification.title, notification.description);
        }
        ClientEvent::Failure(notification) => {
            eprintln!("{}: {}", notification.title, notification.description);
        }
        ClientEvent::VerificationStarted { tx_hash } => println!("verifying {tx_hash}"),
        ClientEvent::VerificationFinished { tx_hash, status } => {
            println!("{tx_hash}: {status:?}");
        }
    }
}
