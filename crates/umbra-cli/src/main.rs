//! Umbra terminal client entry point.
//!
//! Reads lines from stdin and prints buffer updates to stdout. Logs go to
//! stderr, filtered by `RUST_LOG` (default `info`).

mod relay_driver;
mod system_env;
mod view;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;
use umbra_app::Runtime;
use umbra_client::{
    ClientConfig, Timing,
    transport::{CertificatePin, TransportConfig},
};

use crate::{relay_driver::RelayDriver, system_env::SystemEnv};

/// Encrypted IRC over an anonymizing relay
#[derive(Parser)]
#[command(name = "umbra")]
#[command(about = "Terminal client for the Umbra encrypted IRC bridge")]
#[command(version)]
struct Args {
    /// Relay WebSocket URL (`wss://...`)
    #[arg(long)]
    relay: String,

    /// Bearer credential issued by the authentication service
    #[arg(long, env = "UMBRA_TOKEN", hide_env_values = true)]
    token: String,

    /// Host the certificate pin applies to
    #[arg(long, requires = "pin_sha256")]
    pin_host: Option<String>,

    /// SHA-256 fingerprint of the relay certificate, hex
    #[arg(long, requires = "pin_host")]
    pin_sha256: Option<String>,

    /// IRC network identifier understood by the relay
    #[arg(short, long)]
    server: String,

    /// Channel to join after registration
    #[arg(short, long, default_value = "")]
    channel: String,

    /// Nickname; a random `anonNNNN` when empty
    #[arg(short, long, default_value = "")]
    nick: String,

    /// NickServ password sent after registration
    #[arg(long, env = "UMBRA_NICKSERV_PASSWORD", hide_env_values = true)]
    nickserv_password: Option<String>,

    /// Hide join, part and quit lines
    #[arg(long)]
    suppress_join_quit: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let pin = match (args.pin_host, args.pin_sha256) {
        (Some(host), Some(fingerprint)) => Some(CertificatePin::parse(host, &fingerprint)?),
        _ => None,
    };
    let transport = TransportConfig { bridge_url: args.relay, credential: args.token, pin };
    let config = ClientConfig {
        nickname: args.nick,
        nickserv_password: args.nickserv_password,
        suppress_join_quit: args.suppress_join_quit,
        timing: Timing::default(),
    };

    let (runtime, handle) = Runtime::new(RelayDriver::new(transport), SystemEnv::new(), config);
    let runtime = tokio::spawn(runtime.run());
    let printer = tokio::spawn(view::print_updates(handle.subscribe()));

    handle.connect(&args.server, &args.channel).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.strip_prefix("/buffer ") {
            Some(name) => handle.select_buffer(name.trim()).await?,
            None => handle.input(line).await?,
        }
    }

    info!("stdin closed, disconnecting");
    handle.disconnect(None).await?;
    drop(handle);
    runtime.await??;
    printer.await??;
    Ok(())
}
