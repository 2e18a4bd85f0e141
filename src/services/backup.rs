use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use tokio::sync::OnceCell;
use url::Url;

use super::database::Database;
use super::settings::{AppSettings, SettingsService, Theme};
use crate::config::{BACKUP_FOLDER_NAME, DRIVE_API_URL, DRIVE_UPLOAD_URL};
use crate::models::{BackupData, BackupSettings, DriveFile, Message};

const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
const JSON_MIME: &str = "application/json";
const MULTIPART_BOUNDARY: &str = "agent_studio_backup_boundary";

#[async_trait]
pub trait BackupStore: Send + Sync {
    /// Backups, newest first.
    async fn list(&self) -> Result<Vec<DriveFile>>;
    async fn save(&self, data: &BackupData) -> Result<DriveFile>;
    async fn load(&self, id: &str) -> Result<BackupData>;
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct CreatedFolder {
    id: String,
}

/// Google Drive v3 store. Holds a bearer token obtained elsewhere.
pub struct DriveBackupStore {
    client: Client,
    access_token: String,
    api_url: String,
    upload_url: String,
    folder_id: OnceCell<String>,
}

impl DriveBackupStore {
    pub fn new(access_token: String) -> Self {
        Self::with_urls(
            access_token,
            DRIVE_API_URL.to_string(),
            DRIVE_UPLOAD_URL.to_string(),
        )
    }

    pub fn with_urls(access_token: String, api_url: String, upload_url: String) -> Self {
        Self {
            client: Client::new(),
            access_token,
            api_url: api_url.trim_end_matches('/').to_string(),
            upload_url: upload_url.trim_end_matches('/').to_string(),
            folder_id: OnceCell::new(),
        }
    }

    fn folder_query() -> String {
        format!(
            "mimeType='{}' and name='{}' and trashed=false",
            FOLDER_MIME, BACKUP_FOLDER_NAME
        )
    }

    fn backups_query(folder_id: &str) -> String {
        format!(
            "'{}' in parents and mimeType='{}' and trashed=false",
            folder_id, JSON_MIME
        )
    }

    fn files_url(&self, params: &[(&str, &str)]) -> Result<Url> {
        Url::parse_with_params(&format!("{}/files", self.api_url), params)
            .context("Invalid Drive API URL")
    }

    /// Listing of backups in `folder_id`, newest first.
    fn list_url(&self, folder_id: &str) -> Result<Url> {
        self.files_url(&[
            ("q", Self::backups_query(folder_id).as_str()),
            ("fields", "files(id, name, createdTime)"),
            ("orderBy", "createdTime desc"),
        ])
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.bearer_auth(&self.access_token)
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
            .unwrap_or_else(|| "Request failed".to_string());
        bail!("Drive HTTP {}: {}", status.as_u16(), message)
    }

    async fn folder_id(&self) -> Result<&str> {
        let id = self
            .folder_id
            .get_or_try_init(|| self.find_or_create_folder())
            .await?;
        Ok(id.as_str())
    }

    async fn find_or_create_folder(&self) -> Result<String> {
        let url = self.files_url(&[
            ("q", Self::folder_query().as_str()),
            ("fields", "files(id, name)"),
            ("spaces", "drive"),
        ])?;
        let response = Self::check(self.authorized(self.client.get(url)).send().await?).await?;
        let list: FileList = response.json().await.context("Invalid folder listing")?;

        if let Some(folder) = list.files.into_iter().next() {
            tracing::debug!("Using backup folder {}", folder.id);
            return Ok(folder.id);
        }

        let url = self.files_url(&[("fields", "id")])?;
        let metadata = serde_json::json!({
            "name": BACKUP_FOLDER_NAME,
            "mimeType": FOLDER_MIME,
        });
        let response = Self::check(
            self.authorized(self.client.post(url))
                .json(&metadata)
                .send()
                .await?,
        )
        .await?;
        let created: CreatedFolder = response.json().await.context("Invalid folder response")?;
        tracing::info!("Created backup folder {}", created.id);
        Ok(created.id)
    }
}

/// Body for a Drive `multipart/related` upload: metadata part, then content.
pub(crate) fn multipart_body(metadata: &serde_json::Value, content: &str) -> String {
    format!(
        "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{meta}\r\n\
         --{b}\r\nContent-Type: {mime}\r\n\r\n{content}\r\n--{b}--",
        b = MULTIPART_BOUNDARY,
        meta = metadata,
        mime = JSON_MIME,
        content = content,
    )
}

#[async_trait]
impl BackupStore for DriveBackupStore {
    async fn list(&self) -> Result<Vec<DriveFile>> {
        let folder_id = self.folder_id().await?;
        let url = self.list_url(folder_id)?;
        let response = Self::check(self.authorized(self.client.get(url)).send().await?).await?;
        let list: FileList = response.json().await.context("Invalid backup listing")?;
        Ok(list.files)
    }

    async fn save(&self, data: &BackupData) -> Result<DriveFile> {
        let folder_id = self.folder_id().await?;
        let metadata = serde_json::json!({
            "name": data.file_name(),
            "mimeType": JSON_MIME,
            "parents": [folder_id],
        });
        let content = serde_json::to_string_pretty(data)?;

        let url = Url::parse_with_params(
            &format!("{}/files", self.upload_url),
            &[("uploadType", "multipart"), ("fields", "id, name, createdTime")],
        )
        .context("Invalid Drive upload URL")?;

        let response = Self::check(
            self.authorized(self.client.post(url))
                .header(
                    reqwest::header::CONTENT_TYPE,
                    format!("multipart/related; boundary={}", MULTIPART_BOUNDARY),
                )
                .body(multipart_body(&metadata, &content))
                .send()
                .await?,
        )
        .await?;

        let file: DriveFile = response.json().await.context("Invalid upload response")?;
        tracing::info!("Saved backup {} ({})", file.name, file.id);
        Ok(file)
    }

    async fn load(&self, id: &str) -> Result<BackupData> {
        let base = format!("{}/files/{}", self.api_url, id);
        let url = Url::parse_with_params(&base, &[("alt", "media")])
            .context("Invalid Drive API URL")?;
        let response = Self::check(self.authorized(self.client.get(url)).send().await?).await?;
        response
            .json()
            .await
            .with_context(|| format!("Backup {} is not valid backup data", id))
    }
}

/// Build a backup of the current settings and chat session.
pub fn snapshot(settings: &AppSettings, api_key: Option<String>, history: Vec<Message>) -> BackupData {
    BackupData {
        timestamp: Utc::now(),
        settings: BackupSettings {
            gemini_api_key: api_key.unwrap_or_default(),
            theme: settings.theme.as_str().to_string(),
            language: settings.language.clone(),
        },
        chat_history: history,
    }
}

#[derive(Debug)]
pub struct RestoredBackup {
    pub settings: AppSettings,
    /// Present only when the backup carried a non-empty key.
    pub api_key: Option<String>,
    pub history: Vec<Message>,
}

/// Merge a backup into `current`. Unknown theme or language values are ignored.
pub fn apply_backup(data: BackupData, current: &AppSettings) -> RestoredBackup {
    let mut settings = current.clone();
    match Theme::from_str(&data.settings.theme) {
        Some(theme) => settings.theme = theme,
        None => tracing::warn!("Ignoring unknown theme '{}' in backup", data.settings.theme),
    }
    if !settings.set_language(&data.settings.language) {
        tracing::warn!(
            "Ignoring unsupported language '{}' in backup",
            data.settings.language
        );
    }

    let api_key = Some(data.settings.gemini_api_key).filter(|k| !k.trim().is_empty());

    RestoredBackup {
        settings,
        api_key,
        history: data.chat_history,
    }
}

/// Fetch backup `id`, persist its settings and chat history, and return what was restored.
pub async fn restore(store: &dyn BackupStore, id: &str, db: &Database) -> Result<RestoredBackup> {
    let data = store.load(id).await.context("Failed to load backup")?;
    let current = SettingsService::load(db).await;
    let restored = apply_backup(data, &current);

    SettingsService::save_with_history(db, &restored.settings, &restored.history).await?;
    tracing::info!(
        "Restored backup {} with {} messages",
        id,
        restored.history.len()
    );
    Ok(restored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        files: Mutex<Vec<(DriveFile, BackupData)>>,
    }

    #[async_trait]
    impl BackupStore for MemoryStore {
        async fn list(&self) -> Result<Vec<DriveFile>> {
            let files = self.files.lock().unwrap();
            Ok(files.iter().rev().map(|(f, _)| f.clone()).collect())
        }

        async fn save(&self, data: &BackupData) -> Result<DriveFile> {
            let mut files = self.files.lock().unwrap();
            let file = DriveFile {
                id: format!("file-{}", files.len()),
                name: data.file_name(),
                created_time: Some(data.timestamp),
            };
            files.push((file.clone(), data.clone()));
            Ok(file)
        }

        async fn load(&self, id: &str) -> Result<BackupData> {
            let files = self.files.lock().unwrap();
            files
                .iter()
                .find(|(f, _)| f.id == id)
                .map(|(_, d)| d.clone())
                .ok_or_else(|| anyhow!("File not found: {}", id))
        }
    }

    #[test]
    fn test_queries() {
        assert_eq!(
            DriveBackupStore::folder_query(),
            "mimeType='application/vnd.google-apps.folder' and name='My-Ai-Data' and trashed=false"
        );
        assert_eq!(
            DriveBackupStore::backups_query("abc"),
            "'abc' in parents and mimeType='application/json' and trashed=false"
        );
    }

    #[test]
    fn test_files_url_encodes_query() {
        let store = DriveBackupStore::new("token".into());
        let url = store
            .files_url(&[("q", "name='x' and trashed=false"), ("orderBy", "createdTime desc")])
            .unwrap();
        assert!(url.as_str().starts_with("https://www.googleapis.com/drive/v3/files?q="));
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs[0].1, "name='x' and trashed=false");
        assert_eq!(pairs[1].1, "createdTime desc");
    }

    #[test]
    fn test_multipart_body_layout() {
        let body = multipart_body(&serde_json::json!({"name": "b.json"}), "{\"a\":1}");
        let boundary = format!("--{}", MULTIPART_BOUNDARY);
        assert!(body.starts_with(&boundary));
        assert!(body.contains("{\"name\":\"b.json\"}"));
        assert!(body.contains("Content-Type: application/json\r\n\r\n{\"a\":1}"));
        assert!(body.ends_with(&format!("{}--", boundary)));
    }

    #[test]
    fn test_snapshot_omits_missing_key() {
        let settings = AppSettings::default();
        let data = snapshot(&settings, None, vec![Message::user("hi")]);
        assert_eq!(data.settings.gemini_api_key, "");
        assert_eq!(data.settings.theme, "dark");
        assert_eq!(data.settings.language, "en-US");
        assert_eq!(data.chat_history.len(), 1);
    }

    #[test]
    fn test_apply_backup_keeps_current_key_when_empty() {
        let mut data = snapshot(&AppSettings::default(), None, vec![]);
        data.settings.theme = "light".into();
        data.settings.language = "es-ES".into();

        let restored = apply_backup(data, &AppSettings::default());
        assert_eq!(restored.settings.theme, Theme::Light);
        assert_eq!(restored.settings.language, "es-ES");
        assert!(restored.api_key.is_none());
    }

    #[test]
    fn test_apply_backup_ignores_unknown_values() {
        let mut data = snapshot(&AppSettings::default(), Some("k-123".into()), vec![]);
        data.settings.theme = "sepia".into();
        data.settings.language = "zz-ZZ".into();

        let restored = apply_backup(data, &AppSettings::default());
        assert_eq!(restored.settings, AppSettings::default());
        assert_eq!(restored.api_key.as_deref(), Some("k-123"));
    }

    #[tokio::test]
    async fn test_restore_persists_history_and_settings() {
        let store = MemoryStore::default();
        let db = Database::new_in_memory().unwrap();

        let mut settings = AppSettings::default();
        settings.theme = Theme::Light;
        let history = vec![Message::assistant("hello"), Message::user("remember this")];
        let file = store
            .save(&snapshot(&settings, None, history))
            .await
            .unwrap();

        let restored = restore(&store, &file.id, &db).await.unwrap();
        assert_eq!(restored.history.len(), 2);

        let loaded = db.load_chat_history().await.unwrap();
        assert_eq!(loaded[1].content, "remember this");
        assert_eq!(SettingsService::load(&db).await.theme, Theme::Light);
    }

    #[tokio::test]
    async fn test_restore_missing_backup_fails_without_changes() {
        let store = MemoryStore::default();
        let db = Database::new_in_memory().unwrap();
        db.replace_chat_history(&[Message::user("keep")]).await.unwrap();

        assert!(restore(&store, "nope", &db).await.is_err());
        assert_eq!(db.load_chat_history().await.unwrap().len(), 1);
    }

    #[test]
    fn test_list_url_orders_newest_first() {
        let store = DriveBackupStore::new("token".into());
        let url = store.list_url("folder-1").unwrap();
        let pairs: std::collections::HashMap<String, String> =
            url.query_pairs().into_owned().collect();
        assert_eq!(pairs["orderBy"], "createdTime desc");
        assert_eq!(pairs["fields"], "files(id, name, createdTime)");
        assert_eq!(
            pairs["q"],
            "'folder-1' in parents and mimeType='application/json' and trashed=false"
        );
    }

    #[tokio::test]
    async fn test_failed_restore_keeps_settings() {
        let store = MemoryStore::default();
        let db = Database::new_in_memory().unwrap();
        db.replace_chat_history(&[Message::user("keep")]).await.unwrap();

        let mut settings = AppSettings::default();
        settings.theme = Theme::Light;
        let repeated = Message::user("same id twice");
        let file = store
            .save(&snapshot(&settings, None, vec![repeated.clone(), repeated]))
            .await
            .unwrap();

        assert!(restore(&store, &file.id, &db).await.is_err());
        assert_eq!(SettingsService::load(&db).await.theme, Theme::Dark);
        let loaded = db.load_chat_history().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].content, "keep");
    }
}
