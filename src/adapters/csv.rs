use anyhow::{Context, Result};
use pulse_core::table::Table;
use std::{
    fs::File,
    io::{Read, Write},
    path::Path,
};

/// Reads a CSV file with a header row.
///
/// All cells are kept as text.
pub fn read_table<R: Read>(reader: R) -> Result<Table> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = rdr.headers()?.iter().map(str::trim).map(ToOwned::to_owned);
    let mut table = Table::new(headers);
    for record in rdr.records() {
        let record = record?;
        table.push_row(record.iter().map(ToOwned::to_owned).collect());
    }
    Ok(table)
}

pub fn write_table<W: Write>(writer: W, table: &Table) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(&table.headers)?;
    for row in &table.rows {
        wtr.write_record(row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn read_table_from_file<P: AsRef<Path>>(path: P) -> Result<Table> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Unable to open {}", path.display()))?;
    read_table(file).with_context(|| format!("Unable to read CSV from {}", path.display()))
}

pub fn write_table_to_file<P: AsRef<Path>>(path: P, table: &Table) -> Result<()> {
    let path = path.as_ref();
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let file =
        File::create(path).with_context(|| format!("Unable to create {}", path.display()))?;
    write_table(file, table)?;
    log::info!("Wrote {} rows to {}", table.len(), path.display());
    Ok(())
}
