pub const APP_ID: &str = "com.agentstudio.AgentStudio";
pub const APP_DIR_NAME: &str = "agent-studio";

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DRIVE_API_URL: &str = "https://www.googleapis.com/drive/v3";
pub const DRIVE_UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3";

pub const DEFAULT_TEXT_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_IMAGEN_MODEL: &str = "imagen-4.0-generate-001";

pub const DEFAULT_LANGUAGE: &str = "en-US";

/// Folder that holds backup blobs in the user's Drive.
pub const BACKUP_FOLDER_NAME: &str = "My-Ai-Data";

pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const API_KEY_ENV_FALLBACK: &str = "API_KEY";
pub const DRIVE_TOKEN_ENV: &str = "GOOGLE_DRIVE_TOKEN";

pub const MAX_IMAGE_COUNT: u8 = 4;
