// ABOUTME: Example application demonstrating a simple login-and-publish flow against an AMI peer
// ABOUTME: Shows usage of ClientBuilder::connect plus the login helper and a single action/reply round trip

use argh::FromArgs;
use ami_client::ClientBuilder;
use std::error::Error;

/// Example application showing the simplest case of logging in and running one action.
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

    /// authenticate using the MD5 challenge-response sequence instead of a plaintext secret
    #[argh(switch)]
    md5: bool,

    /// the Action name to run once logged in (default: Ping)
    #[argh(option, short = 'a')]
    action: Option<String>,
}

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli_args: CliArgs = argh::from_env();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if cli_args.debugging { Level::TRACE } else { Level::INFO })
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let host = cli_args.host.unwrap_or_else(|| "localhost".to_owned());
    let port = cli_args.port.unwrap_or(5038);
    let username = cli_args.username.unwrap_or_default();
    let secret = cli_args.secret.unwrap_or_default();
    let action_name = cli_args.action.unwrap_or_else(|| "Ping".to_owned());

    if cli_args.debugging {
        println!("Connecting to {host}:{port}");
    }

    let client = ClientBuilder::connect(format!("{host}:{port}"))
        .await
        .map_err(|e| {
            eprintln!("Connection failed: {e}");
            Box::<dyn Error>::from(e.to_string())
        })?;

    let logged_in = client.login(&username, &secret, cli_args.md5).await.map_err(|e| {
        eprintln!("Login failed: {e}");
        Box::<dyn Error>::from(e.to_string())
    })?;

    if !logged_in {
        eprintln!("AMI server rejected the login");
        client.dispose().await;
        return Err("login rejected".into());
    }

    println!("Logged in successfully");

    let reply = client.publish(client.action(action_name)).await;

    match reply {
        Ok(msg) => {
            println!(
                "Action completed: Response={:?}, ActionID={:?}",
                msg.get("Response"),
                msg.action_id()
            );

            let logged_off = client.logoff().await.unwrap_or(false);
            if !logged_off {
                eprintln!("Warning: Logoff did not report Goodbye");
            }

            client.dispose().await;
            Ok(())
        }
        Err(e) => {
            eprintln!("Action failed: {e}");
            let _ = client.logoff().await;
            client.dispose().await;
            Err(Box::<dyn Error>::from(e.to_string()))
        }
    }
}
