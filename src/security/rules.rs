//! Detection rules used by the request gate.
//!
//! A [`PatternRuleSet`] is immutable once built: reloading swaps in a whole new
//! set. Within a category, patterns are tried in configured order and the first
//! match wins.

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::RulesConfig;

/// Threat category a pattern belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    SqlInjection,
    Xss,
    PathTraversal,
}

impl RuleCategory {
    /// Categories checked against serialized query and body content, in order.
    pub const CONTENT: [RuleCategory; 2] = [RuleCategory::SqlInjection, RuleCategory::Xss];

    /// Reason reported when a pattern of this category matches.
    pub fn message(&self) -> &'static str {
        match self {
            RuleCategory::SqlInjection => "SQL Injection Attempt",
            RuleCategory::Xss => "XSS Attempt",
            RuleCategory::PathTraversal => "Path Traversal Attempt",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleCategory::SqlInjection => "sql_injection",
            RuleCategory::Xss => "xss",
            RuleCategory::PathTraversal => "path_traversal",
        }
    }
}

impl std::fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("invalid {category} pattern `{pattern}`: {source}")]
pub struct RuleError {
    pub category: RuleCategory,
    pub pattern: String,
    #[source]
    pub source: regex::Error,
}

/// Compiled detection patterns grouped by category.
#[derive(Debug, Clone)]
pub struct PatternRuleSet {
    sql_injection: Vec<Regex>,
    xss: Vec<Regex>,
    path_traversal: Vec<Regex>,
}

impl PatternRuleSet {
    pub fn from_config(config: &RulesConfig) -> Result<Self, RuleError> {
        Ok(Self {
            sql_injection: compile(RuleCategory::SqlInjection, &config.sql_injection)?,
            xss: compile(RuleCategory::Xss, &config.xss)?,
            path_traversal: compile(RuleCategory::PathTraversal, &config.path_traversal)?,
        })
    }

    pub fn patterns(&self, category: RuleCategory) -> &[Regex] {
        match category {
            RuleCategory::SqlInjection => &self.sql_injection,
            RuleCategory::Xss => &self.xss,
            RuleCategory::PathTraversal => &self.path_traversal,
        }
    }

    /// First pattern of `category` matching `text`.
    pub fn first_match(&self, category: RuleCategory, text: &str) -> Option<&Regex> {
        self.patterns(category).iter().find(|p| p.is_match(text))
    }

    /// Test `text` against each category in order; the first category with a
    /// matching pattern is returned.
    pub fn scan(&self, categories: &[RuleCategory], text: &str) -> Option<RuleCategory> {
        categories
            .iter()
            .copied()
            .find(|category| self.first_match(*category, text).is_some())
    }

    pub fn len(&self) -> usize {
        self.sql_injection.len() + self.xss.len() + self.path_traversal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PatternRuleSet {
    fn default() -> Self {
        Self::from_config(&RulesConfig::default()).expect("built-in patterns compile")
    }
}

fn compile(category: RuleCategory, patterns: &[String]) -> Result<Vec<Regex>, RuleError> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|source| RuleError {
                category,
                pattern: pattern.clone(),
                source,
            })
        })
        .collect()
}
