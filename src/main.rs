use clap::Parser;
use log::{error, info};
use scrape_panel::modules::api::HttpApi;
use scrape_panel::modules::controller::Controller;
use scrape_panel::modules::serialize::load_panel_settings;
use scrape_panel::modules::types::{LogEntry, LogLevel};
use scrape_panel::modules::view::{Action, PanelView, StatusBanner};
use simplelog::*;
use std::error::Error;
use std::fs::{self, OpenOptions};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(
    name = "scrape_panel",
    version,
    about = "Console control panel for the scraper server",
    long_about = include_str!("../help.txt")
)]
struct Cli {
    #[arg(short = 'l', long = "log-file", default_value = "scrape_panel.log")]
    log_file: String,

    #[arg(short = 'c', long = "config", default_value = "./panel.toml")]
    config: String,

    #[arg(short = 's', long = "server", help = "Server URL, overrides panel.toml")]
    server: Option<String>,
}

fn init_logger(log_path: &str) -> Result<(), Box<dyn Error>> {
    WriteLogger::init(
        LevelFilter::Info,
        ConfigBuilder::new()
            .set_time_format_rfc3339()
            .build(),
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?,
    )?;
    Ok(())
}

enum Flow {
    Continue,
    Quit,
}

/// Prints what changed in the view since the last render.
#[derive(Default)]
struct Console {
    status: Option<StatusBanner>,
    printed: Vec<LogEntry>,
}

impl Console {
    fn render(&mut self, view: &PanelView) {
        if view.status != self.status {
            if let Some(status) = &view.status {
                println!("== {status}");
            }
            self.status = view.status.clone();
        }

        let entries = view.feed.entries();
        let fresh = if entries.starts_with(&self.printed) {
            &entries[self.printed.len()..]
        } else {
            println!("---- log ----");
            entries
        };
        for entry in fresh {
            println!("{} {entry}", level_tag(entry.level));
        }
        self.printed = entries.to_vec();
    }
}

fn level_tag(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Info => "   ",
        LogLevel::Success => " ok",
        LogLevel::Warning => "  !",
        LogLevel::Error => "ERR",
    }
}

async fn handle(panel: &mut Controller<HttpApi>, line: &str) -> Flow {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Flow::Continue;
    };
    let args: Vec<&str> = words.collect();

    let pressed = match command {
        "load" => Some(Action::Load),
        "save" => Some(Action::Save),
        "stop" => Some(Action::Stop),
        "run" => {
            if !args.is_empty() && !panel.set_batch_inputs(args.first().copied(), args.get(1).copied())
            {
                println!("batch inputs are disabled while the scraper is running");
            }
            Some(Action::Run)
        }
        "start" | "end" => {
            let value = args.first().copied().unwrap_or("");
            let edited = if command == "start" {
                panel.set_batch_inputs(Some(value), None)
            } else {
                panel.set_batch_inputs(None, Some(value))
            };
            if !edited {
                println!("batch inputs are disabled while the scraper is running");
            }
            None
        }
        "show" => {
            println!("{}", panel.view().config_text);
            None
        }
        "edit" => {
            match args.first() {
                Some(path) => match fs::read_to_string(path) {
                    Ok(text) => panel.set_config_text(text),
                    Err(err) => println!("cannot read {path}: {err}"),
                },
                None => println!("usage: edit <file>"),
            }
            None
        }
        "write" => {
            match args.first() {
                Some(path) => {
                    if let Err(err) = fs::write(path, &panel.view().config_text) {
                        println!("cannot write {path}: {err}");
                    }
                }
                None => println!("usage: write <file>"),
            }
            None
        }
        "status" => {
            let view = panel.view();
            let controls = view.controls;
            println!(
                "state: {} | batches {}..{} | load={} save={} run={} stop={}",
                panel.state(),
                view.start_batch,
                view.end_batch,
                controls.load,
                controls.save,
                controls.run,
                controls.stop
            );
            None
        }
        "help" => {
            println!("{}", include_str!("../help.txt"));
            None
        }
        "quit" | "exit" => return Flow::Quit,
        other => {
            println!("unknown command `{other}`, try `help`");
            None
        }
    };

    if let Some(action) = pressed {
        if !panel.press(action).await {
            println!("`{action}` is disabled right now");
        }
    }
    Flow::Continue
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logger(&cli.log_file)?;

    let mut settings = load_panel_settings(&cli.config)?;
    if let Some(server) = cli.server {
        settings.server_url = server;
    }
    info!("panel connecting to {}", settings.server_url);

    let api = HttpApi::new(&settings.server_url, settings.request_timeout())?;
    let mut panel = Controller::new(api, settings.poll_interval());
    let mut console = Console::default();

    panel.init().await;
    console.render(panel.view());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if let Flow::Quit = handle(&mut panel, line.trim()).await {
                        break;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    error!("stdin closed: {err}");
                    break;
                }
            },
            _ = panel.next_tick() => {
                let _ = panel.poll_tick().await;
            }
        }
        console.render(panel.view());
    }

    info!("panel closed while {}", panel.state());
    Ok(())
}
