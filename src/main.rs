//! Kiebitz-RS entry point.
//! Runs an interactive session: start/stop/flip/quit commands typed at a
//! prompt while the detection loop reports on its own thread.

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use dialoguer::Input;
use tracing_subscriber::EnvFilter;

use kiebitz_rs::capture::ScreenSampler;
use kiebitz_rs::{DetectionSink, Detector, config};

/// Prints tick outcomes to stdout. Presentation only - the detector never
/// formats for a terminal itself.
struct ConsoleSink;

impl DetectionSink for ConsoleSink {
    fn on_move(&self, uci: &str) {
        println!("Move detected: {uci}");
    }

    fn on_log(&self, message: &str) {
        println!("{message}");
    }
}

fn main() -> Result<()> {
    let matches = Command::new("Kiebitz-RS")
        .version("0.1.0")
        .about("Watches an on-screen chessboard and logs the moves it sees")
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .help("Board configuration file")
                .default_value(config::DEFAULT_CONFIG_PATH),
        )
        .arg(
            Arg::new("x")
                .long("x")
                .value_name("PIXELS")
                .help("Board left edge, overrides the config file")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("y")
                .long("y")
                .value_name("PIXELS")
                .help("Board top edge, overrides the config file")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("size")
                .long("size")
                .value_name("PIXELS")
                .help("Board edge length, overrides the config file")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("flipped")
                .long("flipped")
                .action(ArgAction::SetTrue)
                .help("Start with black at the bottom of the board"),
        )
        .arg(
            Arg::new("save-config")
                .long("save-config")
                .action(ArgAction::SetTrue)
                .help("Write the effective configuration to the config file and exit"),
        )
        .get_matches();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path = matches.get_one::<String>("config").unwrap(); // Safe due to default

    let mut config =
        config::load_or_default(config_path).context("Failed to load board configuration")?;
    if let Some(&x) = matches.get_one::<u32>("x") {
        config.board.x = x;
    }
    if let Some(&y) = matches.get_one::<u32>("y") {
        config.board.y = y;
    }
    if let Some(&size) = matches.get_one::<u32>("size") {
        config.board.size = size;
    }
    if matches.get_flag("flipped") {
        config.flipped = true;
    }

    if matches.get_flag("save-config") {
        config::save(&config, config_path)?;
        println!("Configuration written to {config_path}");
        return Ok(());
    }

    println!("Kiebitz-RS move watcher starting...");
    println!("Board area: {}", config.board);
    println!("Commands: start, stop, flip, quit");

    let mut detector = Detector::new(ScreenSampler::new(), ConsoleSink, &config);

    loop {
        let command: String = Input::new()
            .with_prompt(">")
            .allow_empty(true)
            .interact_text()
            .context("Failed to read command")?;

        match command.trim() {
            "start" => detector.start(),
            "stop" => detector.stop(),
            "flip" => detector.flip(),
            "quit" | "q" => {
                detector.stop();
                break;
            }
            "" => {}
            other => println!("Unknown command '{other}' (start, stop, flip, quit)"),
        }
    }

    Ok(())
}
