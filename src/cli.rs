use crate::{
    adapters::csv::{read_table_from_file, write_table_to_file},
    config::{Config, Dataset},
    gateways,
};
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use pulse_core::{
    gateways::open_data::OpenDataGateway,
    table::Table,
    usecases::{fetch_all, parse_date, repair_swapped_coordinates, rows_to_table, DateWindow},
};
use std::path::PathBuf;
use time::{format_description::well_known::Rfc3339, Date, OffsetDateTime};

const PULLED_AT_COLUMN: &str = "pulled_utc";

#[derive(Parser)]
#[command(name = "civic-pulse", version)]
#[command(about = "Municipal open data snapshots and batch geocoding")]
pub struct Args {
    /// Configuration file (defaults to civic-pulse.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Geocode the addresses of a CSV file
    Geocode {
        input: PathBuf,
        output: PathBuf,
        #[arg(long, default_value = "id")]
        id_col: String,
        /// One free-form column or street, city, state and zip
        #[arg(long = "addr-col", required = true, num_args = 1..=4)]
        addr_cols: Vec<String>,
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Keep the results of successful chunks if others fail
        #[arg(long)]
        best_effort: bool,
        #[arg(long)]
        debug_dir: Option<PathBuf>,
    },
    /// Pull a snapshot of a configured dataset
    Fetch {
        dataset: String,
        #[arg(long)]
        output: Option<PathBuf>,
        /// Pull a single day (YYYY-MM-DD) instead of the look-back window
        #[arg(long, value_parser = parse_date)]
        target_date: Option<Date>,
        #[arg(long)]
        lookback_days: Option<u32>,
        #[arg(long)]
        no_geocode: bool,
    },
    /// Swap coordinates that were written in the wrong order
    RepairCoordinates {
        input: PathBuf,
        /// Defaults to rewriting the input
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long, default_value = "latitude")]
        lat_col: String,
        #[arg(long, default_value = "longitude")]
        lon_col: String,
    },
}

pub fn run(mut cfg: Config, command: Command) -> Result<()> {
    match command {
        Command::Geocode {
            input,
            output,
            id_col,
            addr_cols,
            chunk_size,
            best_effort,
            debug_dir,
        } => {
            if let Some(size) = chunk_size {
                cfg.geocoding.settings.chunk_size = size;
            }
            if debug_dir.is_some() {
                cfg.geocoding.debug_dir = debug_dir;
            }
            cfg.geocoding.best_effort |= best_effort;
            let mut table = read_table_from_file(&input)?;
            log::info!("Read {} rows from {}", table.len(), input.display());
            let addr_cols: Vec<&str> = addr_cols.iter().map(String::as_str).collect();
            geocode_table(&cfg, &mut table, &id_col, &addr_cols)?;
            write_table_to_file(&output, &table)
        }
        Command::Fetch {
            dataset,
            output,
            target_date,
            lookback_days,
            no_geocode,
        } => {
            let ds = cfg.datasets.get(&dataset).ok_or_else(|| {
                let known: Vec<_> = cfg.datasets.keys().map(String::as_str).collect();
                anyhow!("Unknown dataset '{dataset}' (configured: {})", known.join(", "))
            })?;
            let now = OffsetDateTime::now_utc();
            let window = ds.date_field.as_ref().map(|_| {
                DateWindow::resolve(
                    target_date,
                    lookback_days.unwrap_or(cfg.fetch.lookback_days),
                    now.date(),
                )
            });
            let gw = open_dataset(&cfg, ds, window.as_ref())?;
            let pulled_at = now.format(&Rfc3339)?;
            let Some(mut table) = pull_snapshot(&*gw, ds, &pulled_at)? else {
                log::info!("No rows for {dataset}: nothing written");
                return Ok(());
            };
            match &ds.geocode {
                Some(geocode) if !no_geocode => {
                    table.ensure_row_ids(&geocode.id_column);
                    let addr_cols: Vec<&str> =
                        geocode.address_columns.iter().map(String::as_str).collect();
                    geocode_table(&cfg, &mut table, &geocode.id_column, &addr_cols)?;
                }
                _ => {}
            }
            let output = output.unwrap_or_else(|| {
                let day = window.map(|w| w.start()).unwrap_or_else(|| now.date());
                PathBuf::from(format!("{dataset}_{day}.csv"))
            });
            write_table_to_file(&output, &table)
        }
        Command::RepairCoordinates {
            input,
            output,
            lat_col,
            lon_col,
        } => {
            let mut table = read_table_from_file(&input)?;
            let swapped = repair_swapped_coordinates(&mut table, &lat_col, &lon_col, &cfg.repair)?;
            log::info!("Swapped coordinates of {swapped} of {} rows", table.len());
            write_table_to_file(output.as_ref().unwrap_or(&input), &table)
        }
    }
}

fn open_dataset(
    cfg: &Config,
    ds: &Dataset,
    window: Option<&DateWindow>,
) -> Result<Box<dyn OpenDataGateway>> {
    match window {
        Some(window) => log::info!(
            "Fetching rows from {} to {}",
            window.start(),
            window
                .end()
                .map(|d| d.to_string())
                .unwrap_or_else(|| "now".to_owned())
        ),
        None => log::info!("Fetching all rows"),
    }
    gateways::open_data_gateway(cfg, ds, window)
}

/// Returns `None` if the dataset has no rows in the window.
fn pull_snapshot<G>(gw: &G, ds: &Dataset, pulled_at: &str) -> Result<Option<Table>>
where
    G: OpenDataGateway + ?Sized,
{
    let rows = fetch_all(gw, ds.page_size)?;
    if rows.is_empty() {
        return Ok(None);
    }
    let mut table = rows_to_table(rows, &ds.fields);
    table.push_constant_column(PULLED_AT_COLUMN, pulled_at);
    Ok(Some(table))
}

fn geocode_table(cfg: &Config, table: &mut Table, id_col: &str, addr_cols: &[&str]) -> Result<()> {
    let records = table.address_records(id_col, addr_cols)?;
    if records.is_empty() {
        log::info!("Nothing to geocode");
        return table.left_join_geocodes(id_col, &[]).map_err(Into::into);
    }
    let blank = records.iter().filter(|r| r.parts.is_blank()).count();
    if blank > 0 {
        log::warn!("{blank} of {} addresses are blank and will not match", records.len());
    }
    let geocoder = gateways::batch_geocoder(cfg)?;
    let results = if cfg.geocoding.best_effort {
        let partial = geocoder.geocode_best_effort(&records)?;
        for chunk in &partial.failed {
            log::error!("{}", chunk.error);
        }
        if !partial.is_complete() {
            log::warn!(
                "{} of {} addresses could not be geocoded",
                partial.missing_ids().count(),
                records.len()
            );
        }
        partial.results
    } else {
        geocoder.geocode(&records)?
    };
    let matched = results.iter().filter(|r| r.match_ok).count();
    log::info!("Matched {matched} of {} addresses", records.len());
    table.left_join_geocodes(id_col, &results)?;
    Ok(())
}
