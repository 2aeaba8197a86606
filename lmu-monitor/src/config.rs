//! Command-line interface and runtime configuration

use clap::Parser;
use lmu_adapters::rest::vehicles_url;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Minimum interval between two console redraws
pub const CONSOLE_REDRAW_INTERVAL: Duration = Duration::from_millis(100);

/// Demo feed tick interval
pub const DEMO_TICK_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Live timing monitor for Le Mans Ultimate", long_about = None)]
pub struct Cli {
    /// Game host
    #[arg(long, env = "LMU_HOST", default_value = "localhost")]
    pub host: String,

    /// WebSocket port of the game's control panel
    #[arg(long, env = "LMU_WS_PORT", default_value_t = 6398)]
    pub port: u16,

    /// REST port used for vehicle metadata
    #[arg(long, env = "LMU_REST_PORT", default_value_t = 6397)]
    pub rest_port: u16,

    /// Directory for per-session result files
    #[arg(long, env = "LMU_OUTPUT_DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Address the HTTP read API listens on
    #[arg(long, env = "LMU_LISTEN", default_value = "127.0.0.1:9100")]
    pub listen: SocketAddr,

    /// Disable the terminal display and log to stderr
    #[arg(long, env = "LMU_NO_CONSOLE")]
    pub no_console: bool,

    /// Log file used while the terminal display is active
    #[arg(long, env = "LMU_LOG_FILE", default_value = "LMURacingTelemetry.log")]
    pub log_file: PathBuf,

    /// Feed a synthetic stream instead of connecting to the game
    #[arg(long, env = "LMU_DEMO")]
    pub demo: bool,
}

/// Resolved configuration
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    pub ws_url: String,
    pub vehicles_url: String,
    pub output_dir: PathBuf,
    pub listen: SocketAddr,
    pub console: bool,
    pub log_file: PathBuf,
    pub demo: bool,
}

impl From<Cli> for MonitorConfig {
    fn from(cli: Cli) -> Self {
        Self {
            ws_url: websocket_url(&cli.host, cli.port),
            vehicles_url: vehicles_url(&cli.host, cli.rest_port),
            output_dir: cli.output_dir,
            listen: cli.listen,
            console: !cli.no_console,
            log_file: cli.log_file,
            demo: cli.demo,
        }
    }
}

pub fn websocket_url(host: &str, port: u16) -> String {
    format!("ws://{}:{}/websocket/controlpanel", host, port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["lmu-telemetry"]).unwrap();
        let config = MonitorConfig::from(cli);
        assert_eq!(config.ws_url, "ws://localhost:6398/websocket/controlpanel");
        assert_eq!(
            config.vehicles_url,
            "http://localhost:6397/rest/sessions/getAllVehicles"
        );
        assert_eq!(config.listen, "127.0.0.1:9100".parse().unwrap());
        assert!(config.console);
        assert!(!config.demo);
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "lmu-telemetry",
            "--host",
            "192.168.1.20",
            "--port",
            "7000",
            "--rest-port",
            "7001",
            "--no-console",
            "--demo",
        ])
        .unwrap();
        let config = MonitorConfig::from(cli);
        assert_eq!(config.ws_url, "ws://192.168.1.20:7000/websocket/controlpanel");
        assert_eq!(
            config.vehicles_url,
            "http://192.168.1.20:7001/rest/sessions/getAllVehicles"
        );
        assert!(!config.console);
        assert!(config.demo);
    }
}
