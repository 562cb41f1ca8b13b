use duration_str::deserialize_option_duration;
use serde::Deserialize;
use std::{collections::BTreeMap, path::PathBuf, time::Duration};

const DEFAULT_CONFIG_FILE: &str = include_str!("civic-pulse.default.toml");

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub geocoding: Option<Geocoding>,
    pub fetch: Option<Fetch>,
    pub repair: Option<Repair>,
    #[serde(default)]
    pub datasets: BTreeMap<String, Dataset>,
}

impl Default for Config {
    fn default() -> Self {
        let cfg: Self = toml::from_str(DEFAULT_CONFIG_FILE).expect("Default configuration");
        cfg
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Geocoding {
    pub api_url: Option<String>,
    pub benchmark: Option<String>,
    pub chunk_size: Option<usize>,
    pub max_attempts: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_option_duration")]
    pub base_backoff: Option<Duration>,
    #[serde(default, deserialize_with = "deserialize_option_duration")]
    pub chunk_pause: Option<Duration>,
    #[serde(default, deserialize_with = "deserialize_option_duration")]
    pub request_timeout: Option<Duration>,
    pub best_effort: Option<bool>,
    pub debug_dir: Option<PathBuf>,
}

impl Default for Geocoding {
    fn default() -> Self {
        Config::default()
            .geocoding
            .expect("Geocoding configuration")
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Fetch {
    #[serde(default, deserialize_with = "deserialize_option_duration")]
    pub request_timeout: Option<Duration>,
    pub lookback_days: Option<u32>,
    pub app_token: Option<String>,
}

impl Default for Fetch {
    fn default() -> Self {
        Config::default().fetch.expect("Fetch configuration")
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Repair {
    pub latitude: (f64, f64),
    pub longitude: (f64, f64),
}

impl Default for Repair {
    fn default() -> Self {
        Config::default().repair.expect("Repair configuration")
    }
}

#[derive(Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DatasetKind {
    Socrata,
    Arcgis,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Dataset {
    pub kind: DatasetKind,
    pub url: String,
    pub date_field: Option<String>,
    pub page_size: Option<usize>,
    #[serde(default)]
    pub fields: Vec<String>,
    pub geocode: Option<DatasetGeocode>,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DatasetGeocode {
    pub id_column: Option<String>,
    pub address_columns: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn parse_default_config_from_file() {
        let cfg: Config = toml::from_str(DEFAULT_CONFIG_FILE).unwrap();
        assert!(cfg.geocoding.is_some());
        assert!(cfg.fetch.is_some());
        assert!(cfg.repair.is_some());
        assert!(cfg.datasets.is_empty());
    }

    #[test]
    fn default_geocoding_config() {
        let cfg = Geocoding::default();
        assert_eq!(cfg.chunk_size, Some(2000));
        assert_eq!(cfg.max_attempts, Some(5));
        assert_eq!(cfg.base_backoff, Some(Duration::from_secs(1)));
        assert_eq!(cfg.request_timeout, Some(Duration::from_secs(60)));
        assert!(cfg.debug_dir.is_none());
    }

    #[test]
    fn parse_full_config_example_from_file() {
        let cfg_string = fs::read_to_string("src/config/civic-pulse.full-example.toml").unwrap();
        let cfg: Config = toml::from_str(&cfg_string).unwrap();
        assert_eq!(cfg.datasets.len(), 3);
        assert!(cfg.datasets["buf-permits"].geocode.is_some());
    }
}
