use clap::Parser;
use log::info;
use scrape_panel::modules::serialize::load_server_settings;
use scrape_panel::modules::server::{AppState, router};
use simplelog::*;
use std::env;
use std::error::Error;
use std::fs::OpenOptions;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "panel_server",
    version,
    about = "HTTP server behind the scrape panel",
    long_about = None
)]
struct Cli {
    #[arg(short = 'l', long = "log-file", default_value = "panel_server.log")]
    log_file: String,

    #[arg(
        short = 's',
        long = "settings",
        value_name = "FILE",
        help = "Path to panel_server.toml",
        default_value = "./panel_server.toml"
    )]
    settings: String,

    #[arg(short = 'c', long = "config-file", help = "Scraper config file, overrides the settings")]
    config_file: Option<PathBuf>,
}

fn init_logger(log_path: &str) -> Result<(), Box<dyn Error>> {
    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(
            LevelFilter::Info,
            ConfigBuilder::new()
                .set_time_format_rfc3339()
                .build(),
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_path)?,
        ),
    ])?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logger(&cli.log_file)?;

    let mut settings = load_server_settings(&cli.settings)?;
    if let Some(config_file) = cli.config_file {
        settings.config_file = config_file;
    }
    info!(
        "scraper `{}`, config {}",
        settings.scraper_executable,
        settings.config_file.display()
    );

    let app = router(AppState::new(settings));

    let port = env::var("PANEL_SERVER_PORT")
        .ok()
        .and_then(|val| val.parse::<u16>().ok())
        .unwrap_or(5000);
    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    info!("Panel server running on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
