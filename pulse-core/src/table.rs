use crate::{
    entities::{AddressParts, AddressRecord, GeocodeResult, MAX_ADDRESS_COMPONENTS},
    error::ConfigError,
};
use std::collections::HashMap;

pub const LATITUDE: &str = "latitude";
pub const LONGITUDE: &str = "longitude";
pub const MATCH_OK: &str = "match_ok";

/// Suffix of columns that are shadowed by joined geocodes.
pub const ORIGINAL_SUFFIX: &str = "_orig";

/// A rectangular table of text cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<S: Into<String>>(headers: impl IntoIterator<Item = S>) -> Self {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: vec![],
        }
    }

    /// Appends a row, padding or truncating it to the width of the table.
    pub fn push_row(&mut self, mut row: Vec<String>) {
        row.resize(self.headers.len(), String::new());
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    fn require_columns(&self, names: &[&str]) -> Result<Vec<usize>, ConfigError> {
        let (found, missing): (Vec<_>, Vec<_>) = names
            .iter()
            .map(|name| self.column_index(name).ok_or(*name))
            .partition(Result::is_ok);
        if !missing.is_empty() {
            let missing = missing
                .into_iter()
                .filter_map(Result::err)
                .map(ToOwned::to_owned)
                .collect();
            return Err(ConfigError::MissingColumns(missing));
        }
        Ok(found.into_iter().filter_map(Result::ok).collect())
    }

    /// Selects the rows to geocode.
    ///
    /// A single address column holds a free-form address, multiple
    /// columns are taken as street, city, state and zip.
    pub fn address_records(
        &self,
        id_col: &str,
        addr_cols: &[&str],
    ) -> Result<Vec<AddressRecord>, ConfigError> {
        if addr_cols.is_empty() || addr_cols.len() > MAX_ADDRESS_COMPONENTS {
            return Err(ConfigError::AddressColumns(format!(
                "expected 1 to {MAX_ADDRESS_COMPONENTS} columns, got {}",
                addr_cols.len()
            )));
        }
        let mut required = vec![id_col];
        required.extend_from_slice(addr_cols);
        let indexes = self.require_columns(&required)?;
        let (id_idx, addr_idxs) = (indexes[0], &indexes[1..]);

        self.rows
            .iter()
            .map(|row| {
                let values: Vec<&str> = addr_idxs.iter().map(|&i| row[i].as_str()).collect();
                let parts = AddressParts::from_columns(&values[..])
                    .map_err(|err| ConfigError::AddressColumns(err.to_string()))?;
                Ok(AddressRecord::new(row[id_idx].trim(), parts))
            })
            .collect()
    }

    /// Joins geocodes onto the rows with the matching id.
    ///
    /// Existing `latitude`, `longitude` and `match_ok` columns are kept
    /// with the [`ORIGINAL_SUFFIX`]. Rows without a geocode get empty cells.
    pub fn left_join_geocodes(
        &mut self,
        id_col: &str,
        results: &[GeocodeResult],
    ) -> Result<(), ConfigError> {
        let id_idx = self.require_columns(&[id_col])?[0];
        for name in [LATITUDE, LONGITUDE, MATCH_OK] {
            if let Some(idx) = self.column_index(name) {
                self.headers[idx] = format!("{name}{ORIGINAL_SUFFIX}");
            }
        }
        let by_id: HashMap<&str, &GeocodeResult> =
            results.iter().map(|r| (r.id.as_str(), r)).collect();

        self.headers
            .extend([LATITUDE, LONGITUDE, MATCH_OK].map(ToOwned::to_owned));
        for row in &mut self.rows {
            let (lat, lng, ok) = match by_id.get(row[id_idx].trim()) {
                Some(res) => (
                    res.latitude.map(|v| v.to_string()).unwrap_or_default(),
                    res.longitude.map(|v| v.to_string()).unwrap_or_default(),
                    res.match_ok.to_string(),
                ),
                None => Default::default(),
            };
            row.extend([lat, lng, ok]);
        }
        Ok(())
    }

    /// Prepends a column with the row position unless it already exists.
    pub fn ensure_row_ids(&mut self, name: &str) {
        if self.column_index(name).is_some() {
            return;
        }
        self.headers.insert(0, name.to_owned());
        for (pos, row) in self.rows.iter_mut().enumerate() {
            row.insert(0, pos.to_string());
        }
    }

    /// Appends a column with the same value in every row.
    pub fn push_constant_column(&mut self, name: &str, value: &str) {
        self.headers.push(name.to_owned());
        for row in &mut self.rows {
            row.push(value.to_owned());
        }
    }
}
