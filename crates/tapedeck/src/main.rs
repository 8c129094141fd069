//! Tapedeck - CLI Entry Point

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tapedeck::config::{CaptureConfig, Config, MockConfig};
use tapedeck::mock::MockServer;
use tapedeck::proxy::ProxyServer;
use tapedeck::recording::IdPrefixes;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "tapedeck",
    about = "Record HTTP traffic through a capture proxy and replay it from a mock server",
    version
)]
struct Cli {
    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the capture proxy
    Capture(CaptureArgs),
    /// Run the mock server
    Mock(MockArgs),
}

#[derive(Args, Debug)]
struct CaptureArgs {
    /// Listen port [default: 8091]
    #[arg(short, long, env = "CAPTURE_PORT")]
    port: Option<u16>,

    /// Directory captures are saved into [default: ./captured]
    #[arg(short, long, env = "OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Forward to the absolute URL each request names
    #[arg(long, env = "TRANSPARENT_MODE")]
    transparent: bool,

    /// Per-service target, e.g. accounts=http://localhost:9000 (repeatable)
    #[arg(long = "target", value_name = "NAME=URL", value_parser = parse_target)]
    targets: Vec<(String, String)>,

    /// Path segment prefix marking an identifier (repeatable) [default: CUST-, ACC-]
    #[arg(long = "id-prefix", value_name = "PREFIX")]
    id_prefixes: Vec<String>,

    /// Timeout for a whole forwarded exchange, in seconds [default: 30]
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct MockArgs {
    /// Listen port [default: 8090]
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Directory of fixture files [default: ./configs]
    #[arg(short, long, env = "CONFIG_PATH")]
    fixtures: Option<PathBuf>,

    /// Quiet period before reloading after a change, in milliseconds [default: 100]
    #[arg(long)]
    debounce_ms: Option<u64>,

    /// Do not reload when fixture files change
    #[arg(long)]
    no_watch: bool,

    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn parse_target(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, url)) if !name.is_empty() && !url.is_empty() => {
            Ok((name.to_string(), url.to_string()))
        }
        _ => Err(format!("expected NAME=URL, got '{raw}'")),
    }
}

fn load_file(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => {
            info!(path = %path.display(), "Loading configuration");
            Config::from_file(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))
        }
        None => Ok(Config::default()),
    }
}

impl CaptureArgs {
    fn into_config(self) -> Result<CaptureConfig> {
        let mut config = load_file(self.config.as_ref())?.capture;
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(output_dir) = self.output_dir {
            config.output_dir = output_dir;
        }
        if self.transparent {
            config.transparent = true;
        }
        config.targets.extend(self.targets);
        if !self.id_prefixes.is_empty() {
            config.id_prefixes = IdPrefixes::new(self.id_prefixes);
        }
        if let Some(timeout_secs) = self.timeout_secs {
            config.upstream_timeout_secs = timeout_secs;
        }
        config.merge_env_targets(|var| std::env::var(var).ok());
        Ok(config)
    }
}

impl MockArgs {
    fn into_config(self) -> Result<MockConfig> {
        let mut config = load_file(self.config.as_ref())?.mock;
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(fixtures) = self.fixtures {
            config.fixtures_dir = fixtures;
        }
        if let Some(debounce_ms) = self.debounce_ms {
            config.debounce_ms = debounce_ms;
        }
        if self.no_watch {
            config.watch = false;
        }
        Ok(config)
    }
}

fn init_tracing(format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|e| anyhow::anyhow!(e))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format)?;

    match cli.command {
        Command::Capture(args) => {
            let config = args.into_config()?;
            let server = ProxyServer::new(&config)?;
            let store = server.store();
            tokio::select! {
                result = server.run() => result,
                _ = tokio::signal::ctrl_c() => {
                    if !store.is_empty() {
                        info!("Shutting down with {} unsaved captures", store.len());
                    }
                    Ok(())
                }
            }
        }
        Command::Mock(args) => {
            let config = args.into_config()?;
            tokio::select! {
                result = MockServer::new(config).run() => result,
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutting down");
                    Ok(())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_target() {
        assert_eq!(
            parse_target("accounts=http://localhost:9000").unwrap(),
            ("accounts".to_string(), "http://localhost:9000".to_string())
        );
        assert!(parse_target("accounts").is_err());
        assert!(parse_target("=http://x").is_err());
    }

    #[test]
    fn test_cli_parses_capture_flags() {
        let cli = Cli::try_parse_from([
            "tapedeck",
            "capture",
            "--port",
            "9000",
            "--target",
            "users=http://users.test",
            "--id-prefix",
            "ORD-",
        ])
        .unwrap();
        let Command::Capture(args) = cli.command else {
            panic!("expected capture subcommand");
        };
        assert_eq!(args.port, Some(9000));
        assert_eq!(args.targets.len(), 1);

        let config = args.into_config().unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.targets["users"], "http://users.test");
        assert_eq!(config.id_prefixes.as_slice(), &["ORD-".to_string()]);
    }

    #[test]
    fn test_cli_mock_no_watch() {
        let cli = Cli::try_parse_from(["tapedeck", "mock", "--no-watch", "--fixtures", "/tmp/f"])
            .unwrap();
        let Command::Mock(args) = cli.command else {
            panic!("expected mock subcommand");
        };
        let config = args.into_config().unwrap();
        assert!(!config.watch);
        assert_eq!(config.fixtures_dir, PathBuf::from("/tmp/f"));
    }
}
