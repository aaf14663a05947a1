use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

use crate::error::Result;
use crate::solve::SolveRecord;
use crate::stats::{Average, CurrentStats, SessionSummary};
use crate::store::DATE_FORMAT;
use crate::util::{format_millis, format_secs};

/// Time zone used when printing dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateStyle {
    #[default]
    Local,
    Utc,
}

impl DateStyle {
    pub fn format(&self, dt: &DateTime<Local>) -> String {
        match self {
            DateStyle::Local => dt.format(DATE_FORMAT).to_string(),
            DateStyle::Utc => dt.with_timezone(&Utc).format(DATE_FORMAT).to_string(),
        }
    }
}

/// One line of the solves table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveRow {
    #[serde(rename = "Session")]
    pub session: String,
    #[serde(rename = "Num")]
    pub num: usize,
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Time")]
    pub time: String,
    #[serde(rename = "Penalty")]
    pub penalty: String,
    #[serde(rename = "Mix")]
    pub mix: String,
    pub avg5: String,
    pub avg12: String,
    pub avg100: String,
    pub avg1000: String,
    pub avg5000: String,
    pub avg10000: String,
}

impl SolveRow {
    pub fn new(record: &SolveRecord, stats: &CurrentStats, dates: DateStyle) -> Self {
        let cell = |size| stats.current(size).cell();
        Self {
            session: record.session_id.clone(),
            num: record.sequence_number,
            date: dates.format(&record.timestamp),
            time: record.raw_time_ms.map(format_millis).unwrap_or_default(),
            penalty: record.penalty.label().to_string(),
            mix: record.scramble.clone(),
            avg5: cell(5),
            avg12: cell(12),
            avg100: cell(100),
            avg1000: cell(1000),
            avg5000: cell(5000),
            avg10000: cell(10000),
        }
    }

    /// Parse an average cell back: empty is pending
    pub fn average(&self, size: usize) -> Option<Average> {
        let cell = match size {
            5 => &self.avg5,
            12 => &self.avg12,
            100 => &self.avg100,
            1000 => &self.avg1000,
            5000 => &self.avg5000,
            10000 => &self.avg10000,
            _ => return None,
        };
        match cell.as_str() {
            "" => Some(Average::Pending),
            "DNF" => Some(Average::Dnf),
            value => value.parse().ok().map(Average::Secs),
        }
    }
}

fn optional_secs(value: Option<f64>) -> String {
    value.map(format_secs).unwrap_or_default()
}

/// One line of the per-session summary table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRow {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Num solves")]
    pub num_solves: usize,
    #[serde(rename = "Date start")]
    pub date_start: String,
    #[serde(rename = "Date end")]
    pub date_end: String,
    #[serde(rename = "Average")]
    pub average: String,
    #[serde(rename = "Best time")]
    pub best_time: String,
    #[serde(rename = "Best avg5")]
    pub best_avg5: String,
    #[serde(rename = "Best avg12")]
    pub best_avg12: String,
    #[serde(rename = "Best avg100")]
    pub best_avg100: String,
    #[serde(rename = "Best avg1000")]
    pub best_avg1000: String,
    #[serde(rename = "Best avg5000")]
    pub best_avg5000: String,
    #[serde(rename = "Best avg10000")]
    pub best_avg10000: String,
}

impl SessionRow {
    pub fn new(
        name: &str,
        date_start: Option<&DateTime<Local>>,
        date_end: Option<&DateTime<Local>>,
        summary: &SessionSummary,
        dates: DateStyle,
    ) -> Self {
        let best = |size| optional_secs(summary.best_average(size));
        Self {
            name: name.to_string(),
            num_solves: summary.num_solves,
            date_start: date_start.map(|d| dates.format(d)).unwrap_or_default(),
            date_end: date_end.map(|d| dates.format(d)).unwrap_or_default(),
            average: summary.average.cell(),
            best_time: summary.best_single.map(format_millis).unwrap_or_default(),
            best_avg5: best(5),
            best_avg12: best(12),
            best_avg100: best(100),
            best_avg1000: best(1000),
            best_avg5000: best(5000),
            best_avg10000: best(10000),
        }
    }
}

pub fn write_rows<W: Write, T: Serialize>(writer: W, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn read_solve_rows<R: Read>(reader: R) -> Result<Vec<SolveRow>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut rows = Vec::new();
    for row in rdr.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}
