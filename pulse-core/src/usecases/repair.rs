use crate::{error::ConfigError, table::Table};

/// Where correct coordinates of a dataset are expected.
///
/// Both bounds are exclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwapWindow {
    pub latitude: (f64, f64),
    pub longitude: (f64, f64),
}

fn between(value: f64, (min, max): (f64, f64)) -> bool {
    min < value && value < max
}

impl SwapWindow {
    /// The stored pair looks like latitude and longitude were swapped.
    pub fn is_swapped(&self, lat: f64, lng: f64) -> bool {
        between(lat, self.longitude) && between(lng, self.latitude)
    }
}

/// Swaps latitude and longitude of rows that were stored the wrong way round.
///
/// Returns the number of repaired rows. Cells that are not numbers are left alone.
pub fn repair_swapped_coordinates(
    table: &mut Table,
    lat_col: &str,
    lng_col: &str,
    window: &SwapWindow,
) -> Result<usize, ConfigError> {
    let (lat_idx, lng_idx) = match (table.column_index(lat_col), table.column_index(lng_col)) {
        (Some(lat), Some(lng)) => (lat, lng),
        (lat, lng) => {
            let missing = [(lat, lat_col), (lng, lng_col)]
                .into_iter()
                .filter(|(idx, _)| idx.is_none())
                .map(|(_, name)| name.to_owned())
                .collect();
            return Err(ConfigError::MissingColumns(missing));
        }
    };
    let mut repaired = 0;
    for row in &mut table.rows {
        let (Ok(lat), Ok(lng)) = (
            row[lat_idx].trim().parse::<f64>(),
            row[lng_idx].trim().parse::<f64>(),
        ) else {
            continue;
        };
        if window.is_swapped(lat, lng) {
            row.swap(lat_idx, lng_idx);
            repaired += 1;
        }
    }
    if repaired > 0 {
        log::info!("Repaired {repaired} swapped coordinate pairs");
    }
    Ok(repaired)
}
