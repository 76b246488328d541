use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/fixtures".to_string(),
        }
    }
}

/// Typed ingestion settings. The original deployment stored these in a
/// loosely-typed organization settings blob; here they are named fields
/// validated once at the boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestConfig {
    /// Club-name prefixes stripped from team names before matching,
    /// longest first (e.g. "Withdean Youth" before "Withdean").
    pub club_prefixes: Vec<String>,
    /// Squad color/group words that can trail an age-group marker.
    pub color_words: Vec<String>,
    /// Ordered substring list searched for the default home pitch when a
    /// home fixture arrives with no venue text at all.
    pub default_home_pitch_keywords: Vec<String>,
    /// FA-sourced pasted data is away-game-biased in practice, so
    /// ambiguous home/away defaults to Away. Kept configurable because
    /// the bias is a guess tuned to one data source.
    pub assume_away_when_ambiguous: bool,
    pub database: DatabaseConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            club_prefixes: vec!["Withdean Youth".to_string(), "Withdean".to_string()],
            color_words: vec![
                "white".to_string(),
                "red".to_string(),
                "blue".to_string(),
                "black".to_string(),
                "green".to_string(),
                "robins".to_string(),
                "girls".to_string(),
                "boys".to_string(),
            ],
            default_home_pitch_keywords: vec![
                "3g".to_string(),
                "withdean".to_string(),
                "stanley deason".to_string(),
                "balfour".to_string(),
                "dorothy stringer".to_string(),
                "varndean".to_string(),
            ],
            assume_away_when_ambiguous: true,
            database: DatabaseConfig::default(),
        }
    }
}

impl IngestConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = env::var("DATABASE_URL") {
            config.database.url = url;
        }
        if let Ok(prefixes) = env::var("CLUB_NAME_PREFIXES") {
            let parsed: Vec<String> = prefixes
                .split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect();
            if !parsed.is_empty() {
                config.club_prefixes = parsed;
            }
        }
        if let Ok(keywords) = env::var("DEFAULT_HOME_PITCH_KEYWORDS") {
            let parsed: Vec<String> = keywords
                .split(',')
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect();
            if !parsed.is_empty() {
                config.default_home_pitch_keywords = parsed;
            }
        }
        if let Ok(flag) = env::var("ASSUME_AWAY_WHEN_AMBIGUOUS") {
            if let Ok(value) = flag.parse::<bool>() {
                config.assume_away_when_ambiguous = value;
            }
        }

        config
    }
}
