use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::message::Message;

/// Snapshot of settings and chat history stored in the user's Drive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupData {
    pub timestamp: DateTime<Utc>,
    pub settings: BackupSettings,
    #[serde(default)]
    pub chat_history: Vec<Message>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupSettings {
    #[serde(default)]
    pub gemini_api_key: String,
    pub theme: String,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub created_time: Option<DateTime<Utc>>,
}

impl BackupData {
    /// File name used when uploading, e.g. `backup_2026-01-02T03-04-05-678Z.json`.
    pub fn file_name(&self) -> String {
        let stamp = self
            .timestamp
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
            .replace([':', '.'], "-");
        format!("backup_{}.json", stamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_wire_format_is_camel_case() {
        let data = BackupData {
            timestamp: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
            settings: BackupSettings {
                gemini_api_key: String::new(),
                theme: "dark".to_string(),
                language: "fr-FR".to_string(),
            },
            chat_history: vec![Message::user("hello")],
        };
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["settings"]["geminiApiKey"], "");
        assert_eq!(json["chatHistory"][0]["role"], "user");
    }

    #[test]
    fn test_file_name() {
        let data = BackupData {
            timestamp: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
            settings: BackupSettings {
                gemini_api_key: String::new(),
                theme: "light".to_string(),
                language: "en-US".to_string(),
            },
            chat_history: Vec::new(),
        };
        assert_eq!(data.file_name(), "backup_2026-01-02T03-04-05-000Z.json");
    }

    #[test]
    fn test_parse_backup_from_browser_client() {
        let json = r#"{
            "timestamp": "2025-06-01T10:00:00.000Z",
            "settings": {"geminiApiKey": "k", "theme": "dark", "language": "de-DE"},
            "chatHistory": [{"id": "assistant-1", "role": "assistant", "content": "Hi"}]
        }"#;
        let data: BackupData = serde_json::from_str(json).unwrap();
        assert_eq!(data.settings.language, "de-DE");
        assert_eq!(data.chat_history.len(), 1);
    }
}
