use evsim::{RawRules, SearchConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

pub const DEFAULT_CONFIG_PATH: &str = "~/.evsim.yml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub rules: RawRules,
    pub search: ConfigSearch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigSearch {
    pub memo_capacity: usize,
    pub bucket_count: usize,
    pub dealer_cache_capacity: usize,
}

impl Default for ConfigSearch {
    fn default() -> Self {
        let defaults = SearchConfig::default();
        ConfigSearch {
            memo_capacity: defaults.memo_capacity,
            bucket_count: defaults.bucket_count,
            dealer_cache_capacity: defaults.dealer_cache_capacity,
        }
    }
}

impl From<&ConfigSearch> for SearchConfig {
    fn from(config: &ConfigSearch) -> SearchConfig {
        SearchConfig {
            memo_capacity: config.memo_capacity,
            bucket_count: config.bucket_count,
            dealer_cache_capacity: config.dealer_cache_capacity,
        }
    }
}

/// Parses YAML config file content.
///
/// Panics if any error occurs.
pub fn parse_config_from_str(content: &str) -> Config {
    serde_yaml::from_str(content).unwrap()
}

/// Reads the content of a given config file and parses it to a Config.
///
/// Panics if any error occurs.
pub fn parse_config_from_file(filename: &str) -> Config {
    let file_content = fs::read_to_string(filename).unwrap();
    parse_config_from_str(&file_content)
}

/// Resolves the `--config` argument. The default path maps to
/// `.evsim.yml` in the home directory and falls back to built-in
/// defaults when that file does not exist; an explicit path must
/// exist.
pub fn load_config(config_arg: &str) -> Config {
    if config_arg != DEFAULT_CONFIG_PATH {
        return parse_config_from_file(config_arg);
    }
    let home_dir = home::home_dir().expect("Cannot find home directory");
    let config_file_path: PathBuf = home_dir.join(".evsim.yml");
    if !config_file_path.exists() {
        return Config::default();
    }
    if config_file_path.is_dir() {
        panic!("This should be a path rather than a directory");
    }
    parse_config_from_file(config_file_path.to_str().unwrap())
}

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use evsim::DoubleRule;

    #[test]
    fn can_parse_a_full_config() {
        let content = "\
rules:
  hitSoft17: true
  doubleRule: 9-11
  peek: true
  decks: 2
search:
  memo_capacity: 1000
  bucket_count: 16
  dealer_cache_capacity: 50
";
        let config = parse_config_from_str(content);
        let rules = config.rules.normalize();
        assert!(rules.hit_soft17);
        assert!(rules.peek);
        assert_eq!(rules.double_rule, DoubleRule::NineEleven);
        assert_eq!(rules.decks, 2);

        let search: SearchConfig = (&config.search).into();
        assert_eq!(search.memo_capacity, 1000);
        assert_eq!(search.bucket_count, 16);
        assert_eq!(search.dealer_cache_capacity, 50);
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config = parse_config_from_str("rules:\n  decks: 1\n");
        assert_eq!(config.rules.normalize().decks, 1);
        let search: SearchConfig = (&config.search).into();
        assert_eq!(search, SearchConfig::default());
    }
}
