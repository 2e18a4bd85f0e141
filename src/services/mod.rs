pub mod aggregator;
pub mod backup;
pub mod database;
pub mod dispatch;
pub mod errors;
pub mod export;
pub mod keyring;
pub mod languages;
pub mod markdown;
pub mod prompts;
pub mod settings;

pub use database::Database;
pub use dispatch::{DispatchConfig, Dispatcher};
pub use errors::StudioError;
pub use keyring::KeyringService;
pub use settings::{AppSettings, SettingsService};
