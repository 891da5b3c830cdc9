pub mod yaml_config;

pub use yaml_config::AppConfig;

#[cfg(feature = "cli")]
use clap::Parser;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "damage-reporter")]
#[command(about = "Damage reporting API with camera-based auto detection")]
pub struct ServeArgs {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    pub config: String,

    /// Override server.host from the config
    #[arg(long)]
    pub host: Option<String>,

    /// Override server.port from the config
    #[arg(long)]
    pub port: Option<u16>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    /// Validate the configuration and exit
    #[arg(long)]
    pub check: bool,
}

#[cfg(feature = "cli")]
impl ServeArgs {
    /// 套用命令列覆蓋設定
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
            tracing::info!("🔧 server.host overridden to: {}", host);
        }
        if let Some(port) = self.port {
            config.server.port = port;
            tracing::info!("🔧 server.port overridden to: {}", port);
        }
    }
}
