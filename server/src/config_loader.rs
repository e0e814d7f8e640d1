use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized, Toml},
};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use warden_application::error::{AppError, AppResult};
use warden_application::infrastructure_config::Config;

const ENV_PREFIX: &str = "WARDEN_";
/// Directory holding `config.toml` / `config.json`. Defaults to the working directory.
const CONFIG_DIR_VAR: &str = "WARDEN_CONFIG_DIR";

pub fn load_config() -> AppResult<Config> {
    generate_env_template_if_missing()?;
    dotenvy::dotenv().ok();

    let config_dir = env::var_os(CONFIG_DIR_VAR).map_or_else(|| PathBuf::from("."), PathBuf::from);
    let figment = file_layers(&config_dir).merge(
        Env::prefixed(ENV_PREFIX)
            .ignore(&["CONFIG_DIR"])
            .split("__"),
    );

    let config = extract(&figment)?;
    config.validate()?;
    info!(config_dir = %config_dir.display(), "Configuration layers merged");
    Ok(config)
}

/// Defaults, then `config.toml`, then `config.json` from `dir`. Later layers win
/// key by key, so a file only needs the settings it changes.
fn file_layers(dir: &Path) -> Figment {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));

    let toml = dir.join("config.toml");
    if toml.exists() {
        figment = figment.merge(Toml::file(toml));
    }

    let json = dir.join("config.json");
    if json.exists() {
        figment = figment.merge(Json::file(json));
    }

    figment
}

fn extract(figment: &Figment) -> AppResult<Config> {
    figment.extract().map_err(|e| AppError::ConfigError {
        message: format!("Failed to load configuration: {e}"),
    })
}

fn generate_env_template_if_missing() -> AppResult<()> {
    let env_file = ".env";
    let template_file = ".env.example";

    if Path::new(env_file).exists() || !Path::new(template_file).exists() {
        return Ok(());
    }

    fs::copy(template_file, env_file).map_err(|e| AppError::ConfigError {
        message: format!("Failed to generate .env file from template: {e}"),
    })?;

    info!("Generated .env from template. Set WARDEN_MODERATION_API__BOT_TOKEN before starting.");
    info!("IMPORTANT: .env holds the bot token and API token and is gitignored.");

    Ok(())
}
