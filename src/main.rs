use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pension_forecast::api::{self, ForecastArgs};
use pension_forecast::config::{ServerConfig, load_engine_config};

#[derive(Parser, Debug)]
#[command(
    name = "pension-forecast",
    about = "Deterministic state-pension forecast (salary path + contribution account + benefit formulas)"
)]
struct Cli {
    #[arg(
        long,
        global = true,
        help = "JSON file overriding engine assumptions; falls back to PENSION_CONFIG"
    )]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API.
    Serve {
        #[arg(long, help = "Listening port; falls back to PORT, then 8080")]
        port: Option<u16>,
    },
    /// Run one forecast and print the JSON response.
    Forecast(ForecastArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let mut server = ServerConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&server.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.or_else(|| server.engine_config_path.clone());
    let engine = match load_engine_config(config_path.as_deref()) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    match cli.command {
        Command::Serve { port } => {
            if let Some(port) = port {
                server.port = port;
            }
            if let Err(e) = api::run_http_server(&server, engine).await {
                eprintln!("Server error: {e}");
                std::process::exit(1);
            }
        }
        Command::Forecast(args) => match api::forecast_json(&args, &engine) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        },
    }
}
