use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::database::Database;
use super::languages;
use crate::models::Message;
use crate::config::{DEFAULT_IMAGEN_MODEL, DEFAULT_IMAGE_MODEL, DEFAULT_LANGUAGE, DEFAULT_TEXT_MODEL};

const SETTINGS_KEY: &str = "app_settings";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub theme: Theme,
    pub language: String,
    pub text_model: String,
    pub image_model: String,
    pub imagen_model: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            _ => None,
        }
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            language: DEFAULT_LANGUAGE.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            imagen_model: DEFAULT_IMAGEN_MODEL.to_string(),
        }
    }
}

impl AppSettings {
    /// Switch the response language. Unknown codes are rejected.
    pub fn set_language(&mut self, code: &str) -> bool {
        if !languages::is_supported(code) {
            return false;
        }
        self.language = code.to_string();
        true
    }
}

pub struct SettingsService;

impl SettingsService {
    pub async fn load(db: &Database) -> AppSettings {
        match db.get_setting(SETTINGS_KEY).await {
            Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_else(|e| {
                tracing::warn!("Ignoring corrupt settings: {}", e);
                AppSettings::default()
            }),
            Ok(None) => AppSettings::default(),
            Err(e) => {
                tracing::warn!("Failed to read settings: {}", e);
                AppSettings::default()
            }
        }
    }

    pub async fn save(db: &Database, settings: &AppSettings) -> Result<()> {
        let json = serde_json::to_string(settings)?;
        db.set_setting(SETTINGS_KEY, &json).await
    }

    /// Save settings and replace the chat history in one transaction.
    pub async fn save_with_history(
        db: &Database,
        settings: &AppSettings,
        history: &[Message],
    ) -> Result<()> {
        let json = serde_json::to_string(settings)?;
        db.replace_chat_history_with_setting(history, SETTINGS_KEY, &json)
            .await
    }
}
