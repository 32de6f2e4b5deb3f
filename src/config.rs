//! Config model and persistence helpers.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Top-level configuration stored in `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Translation service endpoints.
    pub api: ApiCfg,
    /// Identity provider file locations.
    pub auth: AuthCfg,
    /// Translation defaults applied to new jobs.
    pub translation: TranslationCfg,
    /// User profile values shown in the dashboard.
    pub user: UserCfg,
}

/// Endpoints of the translation service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiCfg {
    /// Base URL of the REST API.
    pub base_url: String,
    /// Public site URL used for tracking links.
    pub site_url: String,
}

/// Identity provider related paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthCfg {
    /// OAuth client secret file for the installed flow.
    pub credentials_path: String,
    /// Where issued tokens are cached between runs.
    pub token_cache_path: String,
}

/// Defaults for new translation jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationCfg {
    /// Target language preselected on upload.
    pub default_target_lang: String,
}

/// User metadata shown in the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCfg {
    /// Display name.
    pub full_name: String,
}

impl Config {
    /// Load from disk or create defaults when missing.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            let s = fs::read_to_string(path)?;
            Ok(toml::from_str(&s)?)
        } else {
            let cfg = Self::default();
            cfg.save(path)?;
            Ok(cfg)
        }
    }

    /// Persist the config as pretty TOML.
    pub fn save(&self, path: &Path) -> Result<()> {
        let s = toml::to_string_pretty(self)?;
        fs::write(path, s)?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiCfg {
                base_url: "https://api.polyglotpdf.com/api/v1".into(),
                site_url: "https://www.polyglotpdf.com".into(),
            },
            auth: AuthCfg {
                credentials_path: "credentials.json".into(),
                token_cache_path: "token.json".into(),
            },
            translation: TranslationCfg {
                default_target_lang: "en".into(),
            },
            user: UserCfg {
                full_name: "Your Name".into(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_roundtrip_preserves_values() {
        let mut cfg = Config::default();
        cfg.api.base_url = "http://localhost:8080/api/v1".into();
        cfg.translation.default_target_lang = "fr".into();

        let s = toml::to_string_pretty(&cfg).unwrap();
        let back: Config = toml::from_str(&s).unwrap();
        assert_eq!(back.api.base_url, "http://localhost:8080/api/v1");
        assert_eq!(back.translation.default_target_lang, "fr");
        assert_eq!(back.user.full_name, "Your Name");
    }
}
