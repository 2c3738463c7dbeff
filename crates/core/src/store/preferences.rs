//! User preferences.
//!
//! A single record in the sync area. It is seeded with defaults on first
//! open, changed by shallow merge, and reset rather than deleted.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::{Store, compile_pattern, keys};
use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityLevel {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiProvider {
    #[default]
    OpenAi,
    Anthropic,
    Local,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivacySettings {
    /// Send extracted page text along with prompts.
    pub share_page_content: bool,
    pub share_page_url: bool,
    pub share_selection: bool,
    pub security_level: SecurityLevel,
    /// Domains (and their subdomains) the assistant never touches.
    pub excluded_domains: BTreeSet<String>,
}

impl Default for PrivacySettings {
    fn default() -> Self {
        Self {
            share_page_content: true,
            share_page_url: true,
            share_selection: true,
            security_level: SecurityLevel::default(),
            excluded_domains: BTreeSet::new(),
        }
    }
}

/// Automation flags for one domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationPermissions {
    pub allow_automation: bool,
    pub allow_form_fill: bool,
    pub require_confirmation: bool,
}

impl Default for AutomationPermissions {
    fn default() -> Self {
        Self { allow_automation: false, allow_form_fill: false, require_confirmation: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiSettings {
    pub provider: AiProvider,
    pub model: String,
    pub endpoint: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            provider: AiProvider::default(),
            model: "gpt-4o-mini".into(),
            endpoint: None,
            max_tokens: 1024,
            temperature: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserPreferences {
    pub enabled_categories: Vec<String>,
    pub custom_patterns: Vec<String>,
    pub privacy: PrivacySettings,
    pub automation_permissions: BTreeMap<String, AutomationPermissions>,
    pub ai: AiSettings,
    pub theme: Theme,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            enabled_categories: ["research", "shopping", "productivity", "writing"]
                .into_iter()
                .map(String::from)
                .collect(),
            custom_patterns: Vec::new(),
            privacy: PrivacySettings::default(),
            automation_permissions: BTreeMap::new(),
            ai: AiSettings::default(),
            theme: Theme::default(),
        }
    }
}

/// Shallow merge: each `Some` replaces the whole top-level field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreferencesUpdate {
    pub enabled_categories: Option<Vec<String>>,
    pub custom_patterns: Option<Vec<String>>,
    pub privacy: Option<PrivacySettings>,
    pub automation_permissions: Option<BTreeMap<String, AutomationPermissions>>,
    pub ai: Option<AiSettings>,
    pub theme: Option<Theme>,
}

impl UserPreferences {
    fn apply(&mut self, update: PreferencesUpdate) {
        if let Some(v) = update.enabled_categories {
            self.enabled_categories = v;
        }
        if let Some(v) = update.custom_patterns {
            self.custom_patterns = v;
        }
        if let Some(v) = update.privacy {
            self.privacy = v;
        }
        if let Some(v) = update.automation_permissions {
            self.automation_permissions = v;
        }
        if let Some(v) = update.ai {
            self.ai = v;
        }
        if let Some(v) = update.theme {
            self.theme = v;
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        for pattern in &self.custom_patterns {
            compile_pattern(pattern)?;
        }
        if !(0.0..=2.0).contains(&self.ai.temperature) {
            return Err(Error::InvalidInput("ai.temperature must be between 0 and 2".into()));
        }
        Ok(())
    }

    /// True when `domain` or one of its parent domains is excluded.
    pub fn is_domain_excluded(&self, domain: &str) -> bool {
        let domain = domain.trim().trim_end_matches('.').to_ascii_lowercase();
        self.privacy.excluded_domains.iter().any(|excluded| {
            let excluded = excluded.trim().to_ascii_lowercase();
            domain == excluded || domain.strip_suffix(&excluded).is_some_and(|rest| rest.ends_with('.'))
        })
    }

    /// Permissions for `domain`, falling back to the restrictive default.
    pub fn permissions_for(&self, domain: &str) -> AutomationPermissions {
        self.automation_permissions
            .get(&domain.to_ascii_lowercase())
            .copied()
            .unwrap_or_default()
    }
}

impl Store {
    /// Current preferences, or the defaults when none are stored.
    pub async fn get_preferences(&self) -> Result<UserPreferences, Error> {
        Ok(self.read(keys::PREFERENCES).await?.unwrap_or_default())
    }

    /// Merge `update` into the stored preferences and return the result.
    pub async fn update_preferences(&self, update: PreferencesUpdate) -> Result<UserPreferences, Error> {
        let mut prefs = self.get_preferences().await?;
        prefs.apply(update);
        prefs.validate()?;
        self.write(keys::PREFERENCES, &prefs).await?;
        Ok(prefs)
    }

    pub async fn reset_preferences(&self) -> Result<UserPreferences, Error> {
        let prefs = UserPreferences::default();
        self.write(keys::PREFERENCES, &prefs).await?;
        Ok(prefs)
    }

    pub async fn is_domain_excluded(&self, domain: &str) -> Result<bool, Error> {
        Ok(self.get_preferences().await?.is_domain_excluded(domain))
    }
}
