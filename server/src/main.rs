use clap::Parser;
use log::{error, info};
use server::network::Listener;
use server::session::{Session, SessionCommand};
use std::time::Duration;
use tokio::sync::mpsc;

/// Main-method of the application.
/// Parses command-line arguments, then spawns the session task and the
/// WebSocket accept loop.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Server IP address to bind to
        #[clap(short = 'H', long, default_value = "127.0.0.1")]
        host: String,
        /// Server port to listen on
        #[clap(short, long, default_value = "5000")]
        port: u16,
        /// State broadcast interval in milliseconds
        #[clap(short, long, default_value = "50")]
        interval: u64,
    }

    let args = Args::parse();

    // One channel funnels every state mutation into the session task.
    let (command_tx, command_rx) = mpsc::unbounded_channel::<SessionCommand>();

    let session = Session::new(Duration::from_millis(args.interval));
    let session_handle = tokio::spawn(session.run(command_rx));

    let address = format!("{}:{}", args.host, args.port);
    let listener = Listener::bind(&address).await?;
    let network_handle = tokio::spawn(listener.run(command_tx));

    // Handle shutdown gracefully
    tokio::select! {
        result = session_handle => {
            if let Err(e) = result {
                error!("session task panicked: {}", e);
            }
        }
        result = network_handle => {
            if let Err(e) = result {
                error!("network task panicked: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received ctrl-c, shutting down");
        }
    }

    Ok(())
}
