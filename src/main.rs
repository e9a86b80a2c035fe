//! voxd: offline bilingual text-to-speech engine daemon.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use voxd::assets::VoiceAssets;
use voxd::config::Config;
use voxd::playback::RodioPlayer;
use voxd::server::EngineService;
use voxd::session::EngineSession;
use voxd::sherpa::SherpaLoader;

#[derive(Parser, Debug)]
#[command(name = "voxd", about = "Offline bilingual text-to-speech engine daemon")]
struct Args {
    /// Path to voxd.yaml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Service socket path (overrides config)
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Voice asset directory (overrides config)
    #[arg(long)]
    voice_dir: Option<PathBuf>,

    /// Enable verbose (debug) logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // An uncaught fault is the one condition allowed to kill the daemon;
    // log it before the default abort so it survives into the sink.
    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        tracing::error!("uncaught fault: {panic_info}");
        default_panic(panic_info);
    }));

    info!("voxd starting");

    let mut config = Config::load(args.config.as_deref());
    if let Some(dir) = args.voice_dir {
        config.voice.dir = Some(dir);
    }
    let socket_path = args.socket.unwrap_or_else(|| config.ipc.socket_path());
    let voice_dir = config.voice.resolve_dir();
    info!(
        voice_dir = %voice_dir.display(),
        socket = %socket_path.display(),
        "Config loaded"
    );

    let player = Arc::new(RodioPlayer::new()?);
    let loader = Arc::new(SherpaLoader::new(
        config.voice.speaker_id,
        config.voice.speed,
    ));
    let session = EngineSession::new(
        VoiceAssets::new(voice_dir),
        loader,
        player,
        config.scratch.resolve_dir(),
    );

    let service = EngineService::bind(session, &socket_path)?;
    service.run().await?;

    Ok(())
}
