use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use eframe::egui::ViewportBuilder;
use mpd_art_box::{
    app::ArtBoxApp,
    config::{expand_home, split_mpd_host, ArtStrategy, Config},
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Shows the cover of the track MPD is playing.
#[derive(Parser, Debug)]
#[command(name = "mpd-art-box", version, about)]
struct Args {
    /// Config file path (TOML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// MPD host (default: localhost). A `password@host` value is accepted
    /// but the password is ignored; password-protected servers are not
    /// supported.
    #[arg(long, env = "MPD_HOST")]
    host: Option<String>,

    /// MPD port (default: 6600).
    #[arg(long, env = "MPD_PORT")]
    port: Option<u16>,

    /// Root path of the MPD library; covers are looked up next to each track.
    #[arg(long, value_name = "DIR")]
    library: Option<PathBuf>,

    /// Ask MPD for the picture embedded in each track instead.
    #[arg(long)]
    embedded: bool,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;

    if let Some(host) = &args.host {
        let (password, host) = split_mpd_host(host);
        if password.is_some() {
            warn!(%host, "ignoring the password given in the MPD host");
        }
        config.daemon.host = host.to_owned();
    }
    if let Some(port) = args.port {
        config.daemon.port = port;
    }
    if let Some(library) = &args.library {
        config.art.library = Some(expand_home(library));
    }
    if args.embedded {
        config.art.strategy = Some(ArtStrategy::Embedded);
    } else if args.library.is_some() {
        config.art.strategy = Some(ArtStrategy::Library);
    }

    config.art.source().context("Invalid artwork configuration")?;
    Ok(config)
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let config = load_config(&args)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        daemon = %config.daemon.addr(),
        art = ?config.art.strategy(),
        "starting mpd-art-box"
    );

    let native_options = eframe::NativeOptions {
        viewport: ViewportBuilder::default()
            .with_title("mpd-art-box")
            .with_inner_size([config.window.width, config.window.height]),
        ..Default::default()
    };
    let run_res = eframe::run_native(
        "mpd-art-box",
        native_options,
        Box::new(
            move |cc| -> std::result::Result<
                Box<dyn eframe::App>,
                Box<dyn std::error::Error + Send + Sync>,
            > { Ok(Box::new(ArtBoxApp::new(cc, &config)?)) },
        ),
    );
    if let Err(e) = run_res {
        return Err(Box::new(e));
    }

    Ok(())
}
