use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::error::Result;

/// Outbound SMTP account. `from` doubles as the default sender address for
/// drafts without a sender contact.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SmtpConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub from_name: String,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        SmtpConfig {
            host: String::new(),
            port: default_smtp_port(),
            username: String::new(),
            password: String::new(),
            from: String::new(),
            from_name: String::new(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AiConfig {
    #[serde(default = "default_ai_base_url")]
    pub base_url: String,
    #[serde(default = "default_ai_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_num_predict")]
    pub num_predict: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        AiConfig {
            base_url: default_ai_base_url(),
            model: default_ai_model(),
            temperature: default_temperature(),
            num_predict: default_num_predict(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub ai: AiConfig,
}

fn default_smtp_port() -> u16 {
    587
}

fn default_ai_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ai_model() -> String {
    "llama3.2:latest".to_string()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_num_predict() -> u32 {
    500
}

fn default_timeout_secs() -> u64 {
    120
}

fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::NotFound, "could not find home directory")
    })?;
    Ok(home.join(".config").join("courriel"))
}

pub fn get_config() -> Result<Config> {
    let config_path = config_dir()?.join("config.yml");

    if !config_path.exists() {
        return Ok(Config::default());
    }

    let contents = fs::read_to_string(&config_path)?;
    let config: Config = serde_yaml::from_str(&contents)?;
    Ok(config)
}

pub fn save_config(config: &Config) -> Result<()> {
    let config_dir = config_dir()?;
    fs::create_dir_all(&config_dir)?;

    let config_path = config_dir.join("config.yml");
    let contents = serde_yaml::to_string(config)?;
    fs::write(&config_path, contents)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config: Config = serde_yaml::from_str("smtp:\n  host: smtp.example.com\n").unwrap();
        assert_eq!(config.smtp.host, "smtp.example.com");
        assert_eq!(config.smtp.port, 587);
        assert_eq!(config.ai.base_url, "http://localhost:11434");
        assert_eq!(config.ai.model, "llama3.2:latest");
        assert_eq!(config.ai.timeout_secs, 120);
        assert_eq!(config.ai.num_predict, 500);
    }

    #[test]
    fn config_dir_resolves_without_panicking() {
        let dir = config_dir().unwrap();
        assert!(dir.ends_with(".config/courriel"));
    }
}
