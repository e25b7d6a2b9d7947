use panaderia_core::config::{AppConfig, LoadOptions, LogFormat};

/// Render the effective configuration as JSON, the same merged view the
/// server boots with.
pub fn run() -> String {
    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            let format = match config.logging.format {
                LogFormat::Compact => "compact",
                LogFormat::Pretty => "pretty",
                LogFormat::Json => "json",
            };
            let payload = serde_json::json!({
                "database": {
                    "url": config.database.url,
                    "max_connections": config.database.max_connections,
                    "timeout_secs": config.database.timeout_secs,
                },
                "server": {
                    "bind_address": config.server.bind_address,
                    "port": config.server.port,
                    "health_check_port": config.server.health_check_port,
                    "static_dir": config.server.static_dir,
                },
                "logging": {
                    "level": config.logging.level,
                    "format": format,
                },
            });
            serde_json::to_string_pretty(&payload)
                .unwrap_or_else(|error| format!("{{\"error\":\"{error}\"}}"))
        }
        Err(error) => serde_json::json!({ "error": error.to_string() }).to_string(),
    }
}
