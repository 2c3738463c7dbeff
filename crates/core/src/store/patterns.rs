//! Pattern record CRUD.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Store, compile_pattern, keys, require_non_empty};
use crate::Error;

/// A categorized website regex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub id: String,
    pub pattern: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
}

pub type PatternMap = BTreeMap<String, Pattern>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewPattern {
    pub pattern: String,
    pub category: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatternUpdate {
    pub pattern: Option<String>,
    pub category: Option<String>,
}

impl Pattern {
    pub fn validate(&self) -> Result<(), Error> {
        require_non_empty("pattern", &self.pattern)?;
        require_non_empty("category", &self.category)?;
        compile_pattern(&self.pattern)?;
        Ok(())
    }
}

impl Store {
    pub async fn create_pattern(&self, new: NewPattern) -> Result<String, Error> {
        let pattern = Pattern {
            id: uuid::Uuid::new_v4().to_string(),
            pattern: new.pattern,
            category: new.category,
            created_at: Utc::now(),
        };
        pattern.validate()?;

        let mut patterns = self.get_all_patterns().await?;
        let id = pattern.id.clone();
        patterns.insert(id.clone(), pattern);
        self.write(keys::PATTERNS, &patterns).await?;
        Ok(id)
    }

    pub async fn get_pattern(&self, id: &str) -> Result<Option<Pattern>, Error> {
        Ok(self.get_all_patterns().await?.remove(id))
    }

    pub async fn get_all_patterns(&self) -> Result<PatternMap, Error> {
        Ok(self.read(keys::PATTERNS).await?.unwrap_or_default())
    }

    /// Merge `update` into the pattern. Returns false if the id is unknown.
    pub async fn update_pattern(&self, id: &str, update: PatternUpdate) -> Result<bool, Error> {
        let mut patterns = self.get_all_patterns().await?;
        let Some(pattern) = patterns.get_mut(id) else {
            return Ok(false);
        };

        if let Some(value) = update.pattern {
            pattern.pattern = value;
        }
        if let Some(category) = update.category {
            pattern.category = category;
        }
        pattern.validate()?;

        self.write(keys::PATTERNS, &patterns).await?;
        Ok(true)
    }

    pub async fn delete_pattern(&self, id: &str) -> Result<bool, Error> {
        let mut patterns = self.get_all_patterns().await?;
        if patterns.remove(id).is_none() {
            return Ok(false);
        }
        self.write(keys::PATTERNS, &patterns).await?;
        Ok(true)
    }

    pub async fn get_patterns_by_category(&self, category: &str) -> Result<Vec<Pattern>, Error> {
        let patterns = self.get_all_patterns().await?;
        Ok(patterns
            .into_values()
            .filter(|p| p.category == category)
            .collect())
    }

    /// Patterns whose regex matches `domain`, case-insensitively.
    pub async fn get_patterns_for_domain(&self, domain: &str) -> Result<Vec<Pattern>, Error> {
        let patterns = self.get_all_patterns().await?;
        Ok(patterns
            .into_values()
            .filter(|p| match compile_pattern(&p.pattern) {
                Ok(re) => re.is_match(domain),
                Err(e) => {
                    tracing::warn!(pattern_id = %p.id, error = %e, "Skipping invalid pattern");
                    false
                }
            })
            .collect())
    }
}
