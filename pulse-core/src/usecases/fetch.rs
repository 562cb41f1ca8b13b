use crate::{
    gateways::open_data::{FetchError, OpenDataGateway, PageRequest, Row},
    table::Table,
};
use std::collections::BTreeSet;
use time::{macros::format_description, Date, Duration};

/// The period of records to pull from a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateWindow {
    /// Exactly one calendar day.
    Day(Date),
    /// Everything since the given day.
    Since(Date),
}

impl DateWindow {
    /// An explicit target day wins over the rolling look-back.
    pub fn resolve(target: Option<Date>, lookback_days: u32, today: Date) -> Self {
        match target {
            Some(day) => Self::Day(day),
            None => Self::Since(today.saturating_sub(Duration::days(lookback_days.into()))),
        }
    }

    pub fn start(&self) -> Date {
        match self {
            Self::Day(day) | Self::Since(day) => *day,
        }
    }

    /// Exclusive upper bound.
    pub fn end(&self) -> Option<Date> {
        match self {
            Self::Day(day) => day.next_day(),
            Self::Since(_) => None,
        }
    }

    pub fn socrata_where(&self, field: &str) -> String {
        let mut clause = format!("{field} >= '{}'", self.start());
        if let Some(end) = self.end() {
            clause.push_str(&format!(" AND {field} < '{end}'"));
        }
        clause
    }

    pub fn arcgis_where(&self, field: &str) -> String {
        let mut clause = format!("{field} >= DATE '{}'", self.start());
        if let Some(end) = self.end() {
            clause.push_str(&format!(" AND {field} < DATE '{end}'"));
        }
        clause
    }
}

pub fn parse_date(s: &str) -> Result<Date, time::error::Parse> {
    Date::parse(s.trim(), format_description!("[year]-[month]-[day]"))
}

/// Pulls all pages of a feed.
pub fn fetch_all<G>(gateway: &G, page_size: usize) -> Result<Vec<Row>, FetchError>
where
    G: OpenDataGateway + ?Sized,
{
    let limit = page_size.max(1);
    let mut rows = vec![];
    let mut offset = 0;
    loop {
        let page = gateway.fetch_page(&PageRequest { offset, limit })?;
        let count = page.len();
        log::debug!("Fetched {count} rows at offset {offset}");
        rows.extend(page);
        if count == 0 || (count < limit && gateway.stops_at_short_page()) {
            break;
        }
        offset += count;
    }
    log::info!("Fetched {} rows", rows.len());
    Ok(rows)
}

/// Coerces records into a fixed schema.
///
/// Without explicit `columns` the union of all field names is used.
/// Absent fields become empty cells.
pub fn rows_to_table(rows: Vec<Row>, columns: &[String]) -> Table {
    let headers: Vec<String> = if columns.is_empty() {
        rows.iter()
            .flat_map(|row| row.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    } else {
        columns.to_vec()
    };
    let mut table = Table::new(headers);
    for mut row in rows {
        let cells = table
            .headers
            .iter()
            .map(|h| row.remove(h).unwrap_or_default())
            .collect();
        table.push_row(cells);
    }
    table
}
