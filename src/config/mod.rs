use anyhow::{anyhow, Result};
use pulse_core::{
    retry::RetryPolicy,
    usecases::{GeocoderSettings, SwapWindow},
    ConfigError, MAX_BATCH_SIZE,
};
use std::{
    collections::BTreeMap,
    env, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

mod raw;

const DEFAULT_CONFIG_FILE_NAME: &str = "civic-pulse.toml";

const ENV_NAME_SOCRATA_APP_TOKEN: &str = "SOCRATA_APP_TOKEN";
const ENV_NAME_CENSUS_BATCH_URL: &str = "CENSUS_BATCH_URL";

const DEFAULT_PAGE_SIZE: usize = 50_000;
const DEFAULT_ID_COLUMN: &str = "id";

pub struct Config {
    pub geocoding: Geocoding,
    pub fetch: Fetch,
    pub repair: SwapWindow,
    pub datasets: BTreeMap<String, Dataset>,
}

impl Config {
    pub fn try_load_from_file_or_default<P: AsRef<Path>>(file_path: Option<P>) -> Result<Self> {
        let file_path: &Path = file_path.as_ref().map(|p| p.as_ref()).unwrap_or_else(|| {
            log::debug!("No configuration file specified. load {DEFAULT_CONFIG_FILE_NAME}");
            Path::new(DEFAULT_CONFIG_FILE_NAME)
        });

        let raw_config = match fs::read_to_string(file_path) {
            Ok(cfg_string) => toml::from_str(&cfg_string)?,
            Err(err) => match err.kind() {
                ErrorKind::NotFound => {
                    log::debug!(
                        "{} not found => load default configuration.",
                        file_path.display()
                    );
                    Ok(raw::Config::default())
                }
                _ => Err(err),
            }?,
        };
        let mut cfg = Self::try_from(raw_config)?;
        if let Ok(token) = env::var(ENV_NAME_SOCRATA_APP_TOKEN) {
            cfg.fetch.app_token = Some(token);
        }
        if let Ok(url) = env::var(ENV_NAME_CENSUS_BATCH_URL) {
            cfg.geocoding.api_url = url;
        }
        Ok(cfg)
    }
}

pub struct Geocoding {
    pub api_url: String,
    pub settings: GeocoderSettings,
    pub request_timeout: Duration,
    /// Return partial results instead of failing the whole run.
    pub best_effort: bool,
    /// Directory for the raw request and response bodies.
    pub debug_dir: Option<PathBuf>,
}

pub struct Fetch {
    pub request_timeout: Duration,
    pub lookback_days: u32,
    pub app_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetSource {
    Socrata { url: String },
    ArcGis { url: String },
}

pub struct Dataset {
    pub source: DatasetSource,
    pub date_field: Option<String>,
    pub page_size: usize,
    /// The fixed schema of the snapshot. Empty means all fields.
    pub fields: Vec<String>,
    pub geocode: Option<DatasetGeocode>,
}

pub struct DatasetGeocode {
    pub id_column: String,
    pub address_columns: Vec<String>,
}

impl TryFrom<raw::Config> for Config {
    type Error = anyhow::Error;
    fn try_from(from: raw::Config) -> Result<Self> {
        let raw::Config {
            geocoding,
            fetch,
            repair,
            datasets,
        } = from;

        let raw::Geocoding {
            api_url,
            benchmark,
            chunk_size,
            max_attempts,
            base_backoff,
            chunk_pause,
            request_timeout,
            best_effort,
            debug_dir,
        } = geocoding.unwrap_or_default();

        let defaults = raw::Geocoding::default();
        let default_settings = GeocoderSettings::default();
        let chunk_size = chunk_size.unwrap_or(default_settings.chunk_size);
        if chunk_size > MAX_BATCH_SIZE {
            return Err(ConfigError::ChunkSizeTooLarge(chunk_size).into());
        }
        if chunk_size == 0 {
            return Err(ConfigError::ChunkSizeZero.into());
        }
        let retry = RetryPolicy {
            max_attempts: max_attempts.unwrap_or(RetryPolicy::default().max_attempts),
            base_backoff: base_backoff.unwrap_or(RetryPolicy::default().base_backoff),
        };
        if retry.max_attempts == 0 {
            return Err(anyhow!("max-attempts must be at least 1"));
        }
        let settings = GeocoderSettings {
            benchmark: benchmark.unwrap_or(default_settings.benchmark),
            chunk_size,
            retry,
            chunk_pause: chunk_pause.unwrap_or(default_settings.chunk_pause),
        };
        let geocoding = Geocoding {
            api_url: api_url
                .or(defaults.api_url)
                .ok_or_else(|| anyhow!("Missing geocoding api-url"))?,
            settings,
            request_timeout: request_timeout
                .or(defaults.request_timeout)
                .ok_or_else(|| anyhow!("Missing geocoding request-timeout"))?,
            best_effort: best_effort.unwrap_or_default(),
            debug_dir,
        };

        let raw::Fetch {
            request_timeout,
            lookback_days,
            app_token,
        } = fetch.unwrap_or_default();
        let fetch_defaults = raw::Fetch::default();
        let fetch = Fetch {
            request_timeout: request_timeout
                .or(fetch_defaults.request_timeout)
                .ok_or_else(|| anyhow!("Missing fetch request-timeout"))?,
            lookback_days: lookback_days.or(fetch_defaults.lookback_days).unwrap_or(1),
            app_token: app_token.filter(|t| !t.is_empty()),
        };

        let raw::Repair {
            latitude,
            longitude,
        } = repair.unwrap_or_default();
        for (name, (min, max)) in [("latitude", latitude), ("longitude", longitude)] {
            if min >= max {
                return Err(anyhow!("Invalid {name} repair range: {min} >= {max}"));
            }
        }
        let repair = SwapWindow {
            latitude,
            longitude,
        };

        let datasets = datasets
            .into_iter()
            .map(|(name, dataset)| {
                let dataset = Dataset::try_from(dataset)
                    .map_err(|err| anyhow!("Invalid dataset '{name}': {err}"))?;
                Ok((name, dataset))
            })
            .collect::<Result<_>>()?;

        Ok(Self {
            geocoding,
            fetch,
            repair,
            datasets,
        })
    }
}

impl TryFrom<raw::Dataset> for Dataset {
    type Error = anyhow::Error;
    fn try_from(from: raw::Dataset) -> Result<Self> {
        let raw::Dataset {
            kind,
            url,
            date_field,
            page_size,
            fields,
            geocode,
        } = from;
        let source = match kind {
            raw::DatasetKind::Socrata => DatasetSource::Socrata { url },
            raw::DatasetKind::Arcgis => DatasetSource::ArcGis { url },
        };
        let geocode = match geocode {
            Some(raw::DatasetGeocode {
                id_column,
                address_columns,
            }) => {
                if address_columns.is_empty() || address_columns.len() > 4 {
                    return Err(anyhow!(
                        "address-columns needs 1 to 4 columns, got {}",
                        address_columns.len()
                    ));
                }
                Some(DatasetGeocode {
                    id_column: id_column.unwrap_or_else(|| DEFAULT_ID_COLUMN.to_owned()),
                    address_columns,
                })
            }
            None => None,
        };
        Ok(Self {
            source,
            date_field,
            page_size: page_size.unwrap_or(DEFAULT_PAGE_SIZE).max(1),
            fields,
            geocode,
        })
    }
}
