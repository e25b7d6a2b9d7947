use serde::Serialize;

use crate::commands::CommandResult;
use panaderia_core::config::{AppConfig, LoadOptions};
use panaderia_db::connect;

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    passed: bool,
    detail: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    command: &'static str,
    status: &'static str,
    checks: Vec<DoctorCheck>,
}

pub fn run(json: bool) -> CommandResult {
    let mut checks = Vec::new();

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config",
                passed: true,
                detail: "configuration loaded and validated".to_string(),
            });
            Some(config)
        }
        Err(error) => {
            checks.push(DoctorCheck { name: "config", passed: false, detail: error.to_string() });
            None
        }
    };

    if let Some(config) = &config {
        match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(runtime) => {
                let detail = runtime.block_on(async {
                    let pool = connect(&config.database)
                        .await
                        .map_err(|error| format!("connection failed: {error}"))?;

                    sqlx::query_scalar::<_, i64>("SELECT 1")
                        .fetch_one(&pool)
                        .await
                        .map_err(|error| format!("probe query failed: {error}"))?;

                    pool.close().await;
                    Ok::<String, String>("database reachable".to_string())
                });

                match detail {
                    Ok(detail) => {
                        checks.push(DoctorCheck { name: "database", passed: true, detail })
                    }
                    Err(detail) => {
                        checks.push(DoctorCheck { name: "database", passed: false, detail })
                    }
                }
            }
            Err(error) => checks.push(DoctorCheck {
                name: "database",
                passed: false,
                detail: format!("failed to initialize async runtime: {error}"),
            }),
        }
    }

    let all_passed = checks.iter().all(|check| check.passed);
    let report = DoctorReport {
        command: "doctor",
        status: if all_passed { "ok" } else { "error" },
        checks,
    };

    let output = if json {
        serde_json::to_string(&report)
            .unwrap_or_else(|error| format!("{{\"error\":\"{error}\"}}"))
    } else {
        let mut lines = vec![format!("doctor: {}", report.status)];
        for check in &report.checks {
            lines.push(format!(
                "  [{}] {}: {}",
                if check.passed { "pass" } else { "fail" },
                check.name,
                check.detail
            ));
        }
        lines.join("\n")
    };

    CommandResult { exit_code: if all_passed { 0 } else { 1 }, output }
}

#[cfg(test)]
mod tests {
    use super::run;

    #[test]
    fn json_report_lists_config_and_database_checks() {
        std::env::set_var("PANADERIA_DATABASE_URL", "sqlite::memory:");
        let result = run(true);
        std::env::remove_var("PANADERIA_DATABASE_URL");

        let parsed: serde_json::Value = serde_json::from_str(&result.output).expect("valid JSON");
        let checks = parsed["checks"].as_array().expect("checks array");

        assert!(checks.iter().any(|check| check["name"] == "config"));
        assert!(checks.iter().any(|check| check["name"] == "database"));
    }
}
