use super::prompts;
use crate::app::{load_config, load_credentials};
use crate::output::{new_table, Output};
use crate::ConfigCommands;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use comfy_table::Cell;
use movie_sync_config::{Config, PathManager, Theme};
use owo_colors::OwoColorize;
use serde_json::json;

pub async fn run_config(cmd: ConfigCommands, output: &Output) -> Result<()> {
    match cmd {
        ConfigCommands::Show { full } => show_config(full, output),
        ConfigCommands::Init => run_interactive_config(output),
        ConfigCommands::Theme { theme } => set_theme(theme, output),
    }
}

fn show_config(full: bool, output: &Output) -> Result<()> {
    let paths = PathManager::default();
    let config_file = paths.config_file();
    let config = load_config(&paths)?;
    let credentials = load_credentials(&paths)?;

    let token = credentials.get_access_token().map(|t| if full { t.clone() } else { mask_string(t) });
    let expires = credentials.get_token_expires().map(|at| at.to_rfc3339());

    if !output.is_human() {
        output.data(&json!({
            "config_file": config_file.display().to_string(),
            "config": config,
            "session": { "access_token": token, "token_expires": expires },
        }));
        return Ok(());
    }
    if output.is_quiet() {
        return Ok(());
    }

    if !config_file.exists() {
        output.warn(format!(
            "No configuration file at {} (showing defaults). Run 'reelview config init' to create one.",
            config_file.display()
        ));
    }

    let mut table = new_table(&["Setting", "Value"]);
    table.add_row(vec![Cell::new("Config file"), Cell::new(config_file.display().to_string())]);
    table.add_row(vec![Cell::new("API base URL"), Cell::new(&config.api.base_url)]);
    table.add_row(vec![Cell::new("Request timeout"), Cell::new(format!("{} s", config.api.timeout_secs))]);
    table.add_row(vec![
        Cell::new("Response cache"),
        Cell::new(format!("{} entries, {} s TTL", config.cache.capacity, config.cache.ttl_secs)),
    ]);
    table.add_row(vec![
        Cell::new("Light lane"),
        Cell::new(format!(
            "{} concurrent, {} ms delay",
            config.queue.light.max_concurrent, config.queue.light.delay_ms
        )),
    ]);
    table.add_row(vec![
        Cell::new("Heavy lane"),
        Cell::new(format!(
            "{} concurrent, {} ms delay",
            config.queue.heavy.max_concurrent, config.queue.heavy.delay_ms
        )),
    ]);
    table.add_row(vec![
        Cell::new("Rate-limit retries"),
        Cell::new(format!(
            "{} (base {} ms, jitter up to {} ms)",
            config.retry.max_retries, config.retry.base_delay_ms, config.retry.max_jitter_ms
        )),
    ]);
    table.add_row(vec![
        Cell::new("Stale after"),
        Cell::new(format!("{} s", config.sync.stale_after_secs)),
    ]);
    table.add_row(vec![
        Cell::new("Refresh interval"),
        Cell::new(format!("{} s", config.sync.refresh_interval_secs)),
    ]);
    table.add_row(vec![
        Cell::new("Persist snapshot"),
        Cell::new(if config.sync.persist_snapshot { "✓".green().to_string() } else { "✗".red().to_string() }),
    ]);
    table.add_row(vec![Cell::new("Theme"), Cell::new(theme_name(config.ui.theme))]);
    table.add_row(vec![
        Cell::new("Access token"),
        Cell::new(token.unwrap_or_else(|| "<not signed in>".to_string())),
    ]);
    if let Some(expires) = expires {
        table.add_row(vec![Cell::new("Token expires"), Cell::new(expires)]);
    }
    output.table(&table);
    Ok(())
}

fn set_theme(theme: Theme, output: &Output) -> Result<()> {
    let paths = PathManager::default();
    let config_file = paths.config_file();
    let mut config = load_config(&paths)?;
    config.ui.theme = theme;
    config
        .save_to_file(&config_file)
        .map_err(|e| eyre!("Failed to save config to {}: {}", config_file.display(), e))?;
    output.success(format!("Theme set to {}", theme_name(theme)));
    Ok(())
}

fn theme_name(theme: Theme) -> &'static str {
    match theme {
        Theme::System => "system",
        Theme::Light => "light",
        Theme::Dark => "dark",
    }
}

fn mask_string(s: &str) -> String {
    if s.is_empty() {
        return "<not set>".to_string();
    }
    if s.len() <= 4 {
        return "*".repeat(s.len());
    }
    match (s.get(..2), s.get(s.len() - 2..)) {
        (Some(head), Some(tail)) => format!("{}***{}", head, tail),
        _ => "*".repeat(s.chars().count()),
    }
}

fn validate_base_url(input: &str) -> Result<(), &'static str> {
    if input.starts_with("http://") || input.starts_with("https://") {
        Ok(())
    } else {
        Err("The API URL must start with http:// or https://")
    }
}

fn print_section_header(title: &str, output: &Output) {
    output.println("");
    output.println(format!("{}", title.bold().bright_cyan()));
    output.println(format!("{}", "─".repeat(title.len()).bright_cyan()));
}

/// Walks through every setting, starting from the current file or defaults
pub fn run_interactive_config(output: &Output) -> Result<()> {
    let paths = PathManager::default();
    let config_file = paths.config_file();
    let mut config = if config_file.exists() {
        Config::load_from_file(&config_file)
            .map_err(|e| eyre!("Failed to load config from {}: {}", config_file.display(), e))?
    } else {
        output.info("Starting interactive configuration wizard...");
        Config::default()
    };

    print_section_header("Backend", output);
    config.api.base_url = loop {
        let url = prompts::prompt_string("API base URL", Some(&config.api.base_url))?;
        match validate_base_url(url.trim()) {
            Ok(()) => break url.trim().to_string(),
            Err(msg) => output.error(msg),
        }
    };
    config.api.timeout_secs =
        prompts::prompt_number_with_output("Request timeout (seconds)", Some(config.api.timeout_secs), Some(output))?;

    print_section_header("Caching", output);
    config.cache.capacity = prompts::prompt_number_with_output(
        "Response cache capacity (entries)",
        Some(config.cache.capacity as u64),
        Some(output),
    )? as usize;
    config.cache.ttl_secs =
        prompts::prompt_number_with_output("Response cache TTL (seconds)", Some(config.cache.ttl_secs), Some(output))?;

    print_section_header("Sync", output);
    config.sync.stale_after_secs = prompts::prompt_number_with_output(
        "Treat collections as stale after (seconds)",
        Some(config.sync.stale_after_secs),
        Some(output),
    )?;
    config.sync.refresh_interval_secs = prompts::prompt_number_with_output(
        "Background refresh interval (seconds)",
        Some(config.sync.refresh_interval_secs),
        Some(output),
    )?;
    config.sync.persist_snapshot = prompts::prompt_yes_no(
        "Keep a local snapshot of your collections?",
        Some(config.sync.persist_snapshot),
    )?;

    print_section_header("Appearance", output);
    let themes = ["system", "light", "dark"];
    let current = themes
        .iter()
        .position(|t| *t == theme_name(config.ui.theme))
        .unwrap_or(0);
    let choice = prompts::prompt_select("Theme", &themes, current)?;
    config.ui.theme = themes[choice].parse().map_err(|e: String| eyre!(e))?;

    config
        .validate()
        .map_err(|e| eyre!("Invalid configuration: {}", e))?;
    config
        .save_to_file(&config_file)
        .map_err(|e| eyre!("Failed to save config to {}: {}", config_file.display(), e))?;

    output.println("");
    output.success(format!("Configuration saved to {}", config_file.display()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_string() {
        assert_eq!(mask_string(""), "<not set>");
        assert_eq!(mask_string("abc"), "***");
        assert_eq!(mask_string("abcdef123"), "ab***23");
    }

    #[test]
    fn test_validate_base_url() {
        assert!(validate_base_url("https://api.example.com").is_ok());
        assert!(validate_base_url("http://localhost:5000/api").is_ok());
        assert!(validate_base_url("localhost:5000").is_err());
    }

    #[test]
    fn test_theme_names_parse_back() {
        for theme in [Theme::System, Theme::Light, Theme::Dark] {
            assert_eq!(theme_name(theme).parse::<Theme>().unwrap(), theme);
        }
    }
}
