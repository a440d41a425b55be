use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use log::{error, info};
use server::config::ServerConfig;
use server::map::GameMap;
use server::network::Server;
use shared::InputScheme;
use std::fs::File;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

/// Exit status for invalid arguments and startup failures.
const EXIT_FAILURE: i32 = 84;

#[derive(Parser, Debug)]
#[command(author, version, about = "Authoritative jetpack game server", long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(1024..))]
    port: u16,

    /// Map file, one line per row
    #[arg(short, long, value_parser = readable_file)]
    map: PathBuf,

    /// Verbose logging and DEBUG_INFO messages to clients
    #[arg(short, long)]
    debug: bool,

    /// Players needed to start a round
    #[arg(short, long, default_value = "2", value_parser = clap::value_parser!(u8).range(2..))]
    clients: u8,

    /// Address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Tick period in milliseconds
    #[arg(long, default_value = "50", value_parser = clap::value_parser!(u64).range(1..))]
    tick_ms: u64,

    /// Frozen snapshots sent after the round ends
    #[arg(long, default_value = "20")]
    linger_ticks: u32,

    /// Read INPUT as a jetpack on/off byte instead of a bitmask
    #[arg(long)]
    legacy_input: bool,
}

fn readable_file(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);
    let metadata = path
        .metadata()
        .map_err(|e| format!("cannot access {}: {}", value, e))?;
    if !metadata.is_file() {
        return Err(format!("{} is not a regular file", value));
    }
    File::open(&path).map_err(|e| format!("cannot read {}: {}", value, e))?;
    Ok(path)
}

impl Args {
    fn into_config(self) -> ServerConfig {
        ServerConfig {
            host: self.host,
            port: self.port,
            max_clients: usize::from(self.clients),
            tick_duration: Duration::from_millis(self.tick_ms),
            linger_ticks: self.linger_ticks,
            input_scheme: if self.legacy_input {
                InputScheme::JetpackFlag
            } else {
                InputScheme::Bitmask
            },
            debug: self.debug,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Single-dash long help, kept for existing launch scripts
    if std::env::args().nth(1).as_deref() == Some("-help") {
        Args::command().print_help()?;
        println!();
        return Ok(());
    }

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.print()?;
            return Ok(());
        }
        Err(e) => {
            let _ = e.print();
            process::exit(EXIT_FAILURE);
        }
    };

    let level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let map = match GameMap::load(&args.map) {
        Ok(map) => map,
        Err(e) => {
            error!("{}", e);
            process::exit(EXIT_FAILURE);
        }
    };
    info!(
        "Loaded map {} ({} rows, {} columns)",
        args.map.display(),
        map.rows(),
        map.cols()
    );

    let config = args.into_config();
    let mut server = match Server::bind(config.clone(), map).await {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to listen on {}: {}", config.address(), e);
            process::exit(EXIT_FAILURE);
        }
    };

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["server", "-p", "4242", "-m", "Cargo.toml"]).unwrap();
        let config = args.into_config();
        assert_eq!(config.port, 4242);
        assert_eq!(config.max_clients, 2);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.tick_duration, Duration::from_millis(50));
        assert_eq!(config.input_scheme, InputScheme::Bitmask);
        assert!(!config.debug);
    }

    #[test]
    fn test_args_rejects_bad_values() {
        // Privileged port
        assert!(Args::try_parse_from(["server", "-p", "80", "-m", "Cargo.toml"]).is_err());
        // Not a number
        assert!(Args::try_parse_from(["server", "-p", "abc", "-m", "Cargo.toml"]).is_err());
        // Too few players
        assert!(
            Args::try_parse_from(["server", "-p", "4242", "-m", "Cargo.toml", "-c", "1"]).is_err()
        );
        // Directory instead of a map file
        assert!(Args::try_parse_from(["server", "-p", "4242", "-m", "src"]).is_err());
        // Missing map
        assert!(Args::try_parse_from(["server", "-p", "4242"]).is_err());
    }

    #[test]
    fn test_args_flags() {
        let args = Args::try_parse_from([
            "server",
            "-p",
            "5000",
            "-m",
            "Cargo.toml",
            "-d",
            "-c",
            "4",
            "--legacy-input",
            "--tick-ms",
            "10",
        ])
        .unwrap();
        let config = args.into_config();
        assert!(config.debug);
        assert_eq!(config.max_clients, 4);
        assert_eq!(config.input_scheme, InputScheme::JetpackFlag);
        assert_eq!(config.tick_duration, Duration::from_millis(10));
    }

    #[test]
    fn test_args_definition() {
        Args::command().debug_assert();
    }
}
