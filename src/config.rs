//! Analysis configuration
//!
//! A fixed, enumerated set of options with documented defaults. Unknown keys
//! are rejected when loading from JSON or TOML.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ==================== TYPE DEFINITIONS ====================

/// Configuration for the whole analysis run
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Minimum similarity (strictly exceeded) to merge two surface strings
    #[serde(default = "default_similarity_threshold")]
    pub name_similarity_threshold: f64,
    #[serde(default = "default_min_name_length")]
    pub min_name_length: usize,
    #[serde(default = "default_max_name_length")]
    pub max_name_length: usize,
    #[serde(default = "default_main_threshold")]
    pub main_character_threshold: f64,
    #[serde(default = "default_supporting_threshold")]
    pub supporting_character_threshold: f64,
    #[serde(default = "default_min_co_occurrence")]
    pub min_co_occurrence: u32,
    #[serde(default = "default_max_co_occurrence")]
    pub max_co_occurrence: u32,
    #[serde(default = "default_saturation")]
    pub explicit_saturation_constant: f64,
    /// Stop-list of common non-name phrases
    #[serde(default = "default_exclude_words")]
    pub exclude_words: Vec<String>,
    /// Enable honorific / diminutive alias links
    #[serde(default = "default_true")]
    pub diminutive_rules: bool,
    /// Half-width of the context window, in characters
    #[serde(default = "default_context_radius")]
    pub context_radius: usize,
    #[serde(default)]
    pub suggestion: SuggestionConfig,
}

/// Limits for the optional name suggestion service
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SuggestionConfig {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Extra attempts after the first one
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Chapter characters included in the prompt
    #[serde(default = "default_prompt_budget")]
    pub prompt_char_budget: usize,
    /// Longest response line still treated as a name
    #[serde(default = "default_max_suggestion_length")]
    pub max_suggestion_length: usize,
    /// Calls allowed to run at once, timed-out ones included
    #[serde(default = "default_max_pending_calls")]
    pub max_pending_calls: usize,
}

fn default_true() -> bool { true }
fn default_similarity_threshold() -> f64 { 0.8 }
fn default_min_name_length() -> usize { 2 }
fn default_max_name_length() -> usize { 4 }
fn default_main_threshold() -> f64 { 50.0 }
fn default_supporting_threshold() -> f64 { 10.0 }
fn default_min_co_occurrence() -> u32 { 5 }
fn default_max_co_occurrence() -> u32 { 100 }
fn default_saturation() -> f64 { 5.0 }
fn default_context_radius() -> usize { 20 }
fn default_timeout_ms() -> u64 { 30_000 }
fn default_max_retries() -> u32 { 2 }
fn default_prompt_budget() -> usize { 2000 }
fn default_max_suggestion_length() -> usize { 10 }
fn default_max_pending_calls() -> usize { 64 }

/// Upper bound on `suggestion.max_retries`
pub const MAX_SUGGESTION_RETRIES: u32 = 10;

/// Pronouns, quantities, places, forms of address and common words that look
/// like names to the rules
const DEFAULT_EXCLUDE_WORDS: &[&str] = &[
    "他", "她", "它", "我", "你", "您", "大家", "众人", "所有人",
    "这个", "那个", "这里", "那里", "地方", "时候", "东西",
    "什么", "怎么", "为什么", "哪里", "怎样", "多少",
    "第一", "第二", "第三", "一个", "两个", "三个",
    "天下", "世界", "国家", "朝廷", "皇帝", "官府",
    "于是", "许多", "任何", "如何", "何时", "高兴", "方向", "方法",
    "万一", "常常", "白色", "金色", "老师", "老人", "老板", "小姐",
    "小心", "小时", "老爷", "阿姨", "大哥", "大姐", "大人", "夫人",
    "公子", "姑娘", "师父", "师兄", "师姐", "先生",
    // bare kinship address
    "哥哥", "姐姐", "妹妹", "弟弟", "师傅", "师弟", "师妹", "爷爷", "奶奶",
    "叔叔", "伯伯", "大叔", "大爷", "兄弟", "姐妹", "老大", "老哥", "老弟",
    // words that open with a surname character
    "周围", "曾经", "江湖", "马上", "方才", "高手", "常年", "许久", "万分",
    "余下", "何必", "何况", "白天", "黄昏", "石头", "金钱", "龙族",
    "夏天", "田野", "林子", "钱财",
];

fn default_exclude_words() -> Vec<String> {
    DEFAULT_EXCLUDE_WORDS.iter().map(|w| w.to_string()).collect()
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            prompt_char_budget: default_prompt_budget(),
            max_suggestion_length: default_max_suggestion_length(),
            max_pending_calls: default_max_pending_calls(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            name_similarity_threshold: default_similarity_threshold(),
            min_name_length: default_min_name_length(),
            max_name_length: default_max_name_length(),
            main_character_threshold: default_main_threshold(),
            supporting_character_threshold: default_supporting_threshold(),
            min_co_occurrence: default_min_co_occurrence(),
            max_co_occurrence: default_max_co_occurrence(),
            explicit_saturation_constant: default_saturation(),
            exclude_words: default_exclude_words(),
            diminutive_rules: true,
            context_radius: default_context_radius(),
            suggestion: SuggestionConfig::default(),
        }
    }
}

// ==================== MAIN IMPLEMENTATION ====================

impl AnalysisConfig {
    /// Parse and validate a JSON config
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: AnalysisConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a TOML config
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: AnalysisConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.name_similarity_threshold) {
            return Err(invalid("name_similarity_threshold", "must be within [0, 1]"));
        }
        if self.min_name_length == 0 {
            return Err(invalid("min_name_length", "must be at least 1"));
        }
        if self.max_name_length < self.min_name_length {
            return Err(invalid("max_name_length", "must not be below min_name_length"));
        }
        if self.supporting_character_threshold > self.main_character_threshold {
            return Err(invalid(
                "supporting_character_threshold",
                "must not exceed main_character_threshold",
            ));
        }
        if self.max_co_occurrence == 0 {
            return Err(invalid("max_co_occurrence", "must be at least 1"));
        }
        if !(self.explicit_saturation_constant > 0.0) {
            return Err(invalid("explicit_saturation_constant", "must be positive"));
        }
        if self.suggestion.timeout_ms == 0 {
            return Err(invalid("suggestion.timeout_ms", "must be positive"));
        }
        if self.suggestion.max_retries > MAX_SUGGESTION_RETRIES {
            return Err(invalid("suggestion.max_retries", "must not exceed 10"));
        }
        if self.suggestion.prompt_char_budget == 0 {
            return Err(invalid("suggestion.prompt_char_budget", "must be at least 1"));
        }
        if self.suggestion.max_pending_calls == 0 {
            return Err(invalid("suggestion.max_pending_calls", "must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.to_string(),
    }
}

// ==================== TESTS ====================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.name_similarity_threshold, 0.8);
        assert_eq!(config.min_name_length, 2);
        assert_eq!(config.max_name_length, 4);
        assert_eq!(config.main_character_threshold, 50.0);
        assert_eq!(config.supporting_character_threshold, 10.0);
        assert_eq!(config.min_co_occurrence, 5);
        assert_eq!(config.max_co_occurrence, 100);
        assert_eq!(config.explicit_saturation_constant, 5.0);
        assert!(config.diminutive_rules);
        assert!(config.exclude_words.iter().any(|w| w == "大家"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = AnalysisConfig::from_json_str(r#"{"min_co_occurrence": 2}"#).unwrap();
        assert_eq!(config.min_co_occurrence, 2);
        assert_eq!(config.max_co_occurrence, 100);
        assert_eq!(config.suggestion.max_retries, 2);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = AnalysisConfig::from_json_str(r#"{"name_similarity": 0.9}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));

        let err = AnalysisConfig::from_toml_str("[suggestion]\nretries = 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn test_toml_config() {
        let source = r#"
name_similarity_threshold = 0.75
exclude_words = ["大家"]

[suggestion]
timeout_ms = 500
max_retries = 1
"#;
        let config = AnalysisConfig::from_toml_str(source).unwrap();
        assert_eq!(config.name_similarity_threshold, 0.75);
        assert_eq!(config.exclude_words, vec!["大家".to_string()]);
        assert_eq!(config.suggestion.timeout_ms, 500);
        assert_eq!(config.suggestion.prompt_char_budget, 2000);
    }

    #[test]
    fn test_validation_failures() {
        let mut config = AnalysisConfig::default();
        config.name_similarity_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = AnalysisConfig::default();
        config.min_name_length = 5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "max_name_length", .. })
        ));

        let mut config = AnalysisConfig::default();
        config.supporting_character_threshold = 80.0;
        assert!(config.validate().is_err());

        let mut config = AnalysisConfig::default();
        config.max_co_occurrence = 0;
        assert!(config.validate().is_err());

        let mut config = AnalysisConfig::default();
        config.explicit_saturation_constant = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_suggestion_limits() {
        let mut config = AnalysisConfig::default();
        config.suggestion.max_retries = MAX_SUGGESTION_RETRIES;
        assert!(config.validate().is_ok());

        config.suggestion.max_retries = u32::MAX;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "suggestion.max_retries", .. })
        ));

        let mut config = AnalysisConfig::default();
        config.suggestion.max_pending_calls = 0;
        assert!(config.validate().is_err());
        assert_eq!(AnalysisConfig::default().suggestion.max_pending_calls, 64);
    }
}
