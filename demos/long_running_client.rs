// ABOUTME: Long-running AMI client example demonstrating the event subscription and keep-alive loop
// ABOUTME: Shows how to watch the event stream and detect terminal disconnection in a production-style client

//! # Long-Running AMI Client
//!
//! This example demonstrates how to run a long-lived AMI client that:
//!
//! * Logs in once and keeps the connection open
//! * Subscribes to the event stream and logs every event it sees
//! * Periodically issues a `Ping` action as a keep-alive
//! * Notices terminal disconnection and exits cleanly instead of hanging
//!
//! ## Usage
//!
//! ```bash
//! cargo run --example long_running_client -- --username admin --secret secret
//!
//! cargo run --example long_running_client -- \
//!   --username admin --secret secret \
//!   --keep-alive-interval 60 --run-duration 600
//! ```

use argh::FromArgs;
use ami_client::ClientBuilder;
use std::error::Error;
use std::time::Duration;
use tokio::time::{interval, sleep};
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Long-running AMI client with a periodic keep-alive ping and event logging
#[derive(FromArgs)]
struct CliArgs {
    /// whether or not to enable debugging
    #[argh(switch, short = 'd')]
    debugging: bool,

    /// the AMI username
    #[argh(option)]
    username: Option<String>,

    /// the AMI secret
    #[argh(option)]
    secret: Option<String>,

    /// the hostname or IP address of the Asterisk server (default: localhost)
    #[argh(option)]
    host: Option<String>,

    /// the port to use when connecting to the AMI listener (default: 5038)
    #[argh(option, short = 'p')]
    port: Option<u32>,

    /// keep-alive ping interval in seconds (default: 30)
    #[argh(option)]
    keep_alive_interval: Option<u64>,

    /// how long to run the client in seconds (default: 300, i.e., 5 minutes)
    #[argh(option)]
    run_duration: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli_args: CliArgs = argh::from_env();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if cli_args.debugging { Level::DEBUG } else { Level::INFO })
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let host = cli_args.host.unwrap_or_else(|| "localhost".to_owned());
    let port = cli_args.port.unwrap_or(5038);
    let username = cli_args.username.unwrap_or_default();
    let secret = cli_args.secret.unwrap_or_default();
    let run_duration = Duration::from_secs(cli_args.run_duration.unwrap_or(300));
    let keep_alive_interval = Duration::from_secs(cli_args.keep_alive_interval.unwrap_or(30));

    info!("Starting long-running AMI client");
    info!("Connecting to {host}:{port}");
    info!("Will run for {} seconds", run_duration.as_secs());

    let client = ClientBuilder::connect(format!("{host}:{port}")).await.map_err(|e| {
        error!("Connection failed: {e}");
        Box::<dyn Error>::from(e.to_string())
    })?;

    let logged_in = client.login(&username, &secret, false).await.map_err(|e| {
        error!("Login failed: {e}");
        Box::<dyn Error>::from(e.to_string())
    })?;

    if !logged_in {
        error!("AMI server rejected the login");
        client.dispose().await;
        return Err("login rejected".into());
    }

    info!("Connected and logged in successfully");

    let mut events = client.subscribe().await;
    let mut ping_timer = interval(keep_alive_interval);
    let mut ping_count = 0u64;
    let mut event_count = 0u64;

    info!("Entering main loop");

    let outcome: Result<(), String> = async {
        loop {
            tokio::select! {
                _ = sleep(run_duration) => {
                    info!("Run duration elapsed, shutting down");
                    return Ok(());
                }

                _ = ping_timer.tick() => {
                    match client.publish(client.action("Ping")).await {
                        Ok(reply) => {
                            ping_count += 1;
                            debug!(count = ping_count, response = ?reply.get("Response"), "keep-alive ping");
                        }
                        Err(e) => {
                            warn!("keep-alive ping failed: {e}");
                            return Err(e.to_string());
                        }
                    }
                }

                event = events.recv() => {
                    match event {
                        Some(Ok(msg)) => {
                            event_count += 1;
                            debug!(count = event_count, event = ?msg.get("Event"), "AMI event received");
                        }
                        Some(Err(cause)) => {
                            warn!("connection terminated: {cause}");
                            return Err(cause.to_string());
                        }
                        None => {
                            warn!("event stream closed");
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
    .await;

    info!("Shutting down client");
    let _ = client.logoff().await;
    client.dispose().await;

    info!("Total keep-alive pings sent: {ping_count}");
    info!("Total events observed: {event_count}");

    outcome.map_err(Box::<dyn Error>::from)
}
