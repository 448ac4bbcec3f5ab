//! Config subcommand - show the effective configuration

use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use crate::config::Config;

pub fn format_table(config: &Config) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Setting").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);

    let http = config.http.http_config();
    table.add_row(vec!["Service URL", &config.service.url_template]);
    table.add_row(vec!["Languages", &config.languages.join(", ")]);
    table.add_row(vec![
        "Workers",
        &format!(
            "{} (max submitted: {})",
            config.workers.threads, config.workers.max_submitted
        ),
    ]);
    table.add_row(vec![
        "Parallel files",
        &config.workers.parallel_files.to_string(),
    ]);
    table.add_row(vec![
        "Monitor interval",
        &format!("{}s", config.workers.monitor_interval_secs),
    ]);
    table.add_row(vec![
        "Timeouts",
        &format!(
            "connect {}s, request {}s",
            config.http.connect_timeout_secs, config.http.request_timeout_secs
        ),
    ]);
    table.add_row(vec![
        "Retries",
        &format!(
            "{} (delay {}ms)",
            config.http.max_retries, config.http.retry_delay_ms
        ),
    ]);
    table.add_row(vec!["User agent", &http.user_agent]);
    table.add_row(vec!["Dump output", &config.output.dump_template]);
    table.add_row(vec!["Beacon output", &config.output.beacon_template]);
    table.add_row(vec![
        "Faulty responses",
        &config
            .output
            .faulty_dir
            .as_ref()
            .map_or_else(|| "not saved".to_string(), |d| d.display().to_string()),
    ]);
    format!("\n{table}")
}

pub fn run(config: &Config) {
    eprintln!("{}", format_table(config));
}
