use std::sync::Arc;

use anyhow::{Context, Result};
use oo7::Keyring;

use crate::config::{API_KEY_ENV, API_KEY_ENV_FALLBACK, APP_ID};

const KEYRING_ATTR_APP: &str = "application";
const KEYRING_ATTR_REF: &str = "key-ref";
const GEMINI_KEY_REF: &str = "gemini";

/// Where the active API key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Environment,
    Keyring,
}

#[derive(Debug, Clone)]
pub struct KeyringService {
    keyring: Arc<Keyring>,
}

impl KeyringService {
    pub async fn new() -> Result<Self> {
        let keyring = Keyring::new()
            .await
            .context("Failed to initialize keyring")?;
        Ok(Self {
            keyring: Arc::new(keyring),
        })
    }

    pub async fn store_api_key(&self, secret: &str) -> Result<()> {
        let attr_refs = Self::attributes();
        self.keyring
            .create_item("Agent Studio Gemini API Key", &attr_refs, secret, true)
            .await
            .context("Failed to store API key in keyring")?;
        tracing::info!("Stored API key in keyring");
        Ok(())
    }

    pub async fn api_key(&self) -> Result<Option<String>> {
        let attr_refs = Self::attributes();
        let items = self
            .keyring
            .search_items(&attr_refs)
            .await
            .context("Failed to search keyring")?;

        let Some(item) = items.first() else {
            return Ok(None);
        };
        let secret = item.secret().await.context("Failed to read secret")?;
        let key = String::from_utf8(secret.to_vec()).context("Secret is not valid UTF-8")?;
        Ok(Some(key).filter(|k| !k.trim().is_empty()))
    }

    pub async fn clear_api_key(&self) -> Result<()> {
        let attr_refs = Self::attributes();
        self.keyring
            .delete(&attr_refs)
            .await
            .context("Failed to delete API key from keyring")?;
        Ok(())
    }

    fn attributes() -> Vec<(&'static str, &'static str)> {
        vec![(KEYRING_ATTR_APP, APP_ID), (KEYRING_ATTR_REF, GEMINI_KEY_REF)]
    }
}

/// API key from `GEMINI_API_KEY`, then `API_KEY`. Blank values are skipped.
pub fn env_api_key<F>(lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    [API_KEY_ENV, API_KEY_ENV_FALLBACK]
        .into_iter()
        .filter_map(|name| lookup(name))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

/// Resolve the API key: environment first, then the keyring.
pub async fn resolve_api_key(keyring: Option<&KeyringService>) -> Option<(String, KeySource)> {
    if let Some(key) = env_api_key(|name| std::env::var(name).ok()) {
        return Some((key, KeySource::Environment));
    }

    let keyring = keyring?;
    match keyring.api_key().await {
        Ok(Some(key)) => Some((key, KeySource::Keyring)),
        Ok(None) => None,
        Err(e) => {
            tracing::warn!("Could not read API key from keyring: {:#}", e);
            None
        }
    }
}
