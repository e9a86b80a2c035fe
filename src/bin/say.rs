//! vox-say: command-line client for the voxd engine daemon.
//!
//! Sends one request over the engine socket and prints the terminal
//! result. Exit status is non-zero when the daemon is unreachable.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use voxd::client::EngineClient;
use voxd::config::Config;
use voxd::language::Language;

#[derive(Parser, Debug)]
#[command(name = "vox-say", about = "Speak text through the voxd engine daemon")]
struct Args {
    /// Text to speak
    text: Option<String>,

    /// Language token: EN or AR (anything else means EN)
    #[arg(short, long, default_value = "EN")]
    lang: String,

    /// Stop current speech instead of speaking
    #[arg(long)]
    stop: bool,

    /// Just ping the daemon and print its acknowledgement
    #[arg(long)]
    ping: bool,

    /// Service socket path (overrides config)
    #[arg(long)]
    socket: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    let socket = args
        .socket
        .unwrap_or_else(|| Config::load(None).ipc.socket_path());
    let client = EngineClient::new(socket);

    if let Err(e) = client.connect().await {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    let result = if args.ping {
        client.ping().await
    } else if args.stop {
        client.stop().await
    } else {
        match &args.text {
            Some(text) => client.speak(text, Language::from_wire(&args.lang)).await,
            None => {
                eprintln!("nothing to do: pass text, --stop, or --ping");
                return ExitCode::FAILURE;
            }
        }
    };

    match result {
        Ok(text) => {
            println!("{text}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
