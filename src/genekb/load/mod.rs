use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::Context;
use csv::StringRecord;
use serde::Serialize;

use flate2::read::MultiGzDecoder;
use zstd::stream::Decoder;

use crate::resolve::MatchStats;

pub mod gene_info;
pub mod gene_ontology;
pub mod clinical;
pub mod constraint;
pub mod gwas;
pub mod gene_summaries;

pub type TsvReader = csv::Reader<Box<dyn BufRead>>;

/// Open a loader input, decompressing `.gz` and `.zst` files.
pub fn open_input(path: &Path) -> anyhow::Result<Box<dyn BufRead>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let file_name = path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let reader: Box<dyn BufRead> =
        if file_name.ends_with(".gz") {
            Box::new(BufReader::new(MultiGzDecoder::new(file)))
        } else if file_name.ends_with(".zst") {
            Box::new(BufReader::new(Decoder::new(file)?))
        } else {
            Box::new(BufReader::new(file))
        };

    Ok(reader)
}

/// Column positions taken from a header line.  A leading '#' on the first
/// name is ignored, as are surrounding spaces.
#[derive(Clone, Debug, Default)]
pub struct ColumnMap {
    positions: HashMap<String, usize>,
    column_count: usize,
}

impl ColumnMap {
    pub fn from_header(header: &StringRecord) -> ColumnMap {
        let mut positions = HashMap::new();

        for (idx, name) in header.iter().enumerate() {
            let name = name.trim().trim_start_matches('#').trim();
            positions.entry(name.to_owned()).or_insert(idx);
        }

        ColumnMap {
            positions,
            column_count: header.len(),
        }
    }

    pub fn column_count(&self) -> usize {
        self.column_count
    }

    /// Position of the first name variant present in the header.
    pub fn find(&self, variants: &[&str]) -> Option<usize> {
        variants.iter()
            .find_map(|variant| self.positions.get(*variant).copied())
    }

    pub fn require(&self, variants: &[&str]) -> anyhow::Result<usize> {
        self.find(variants)
            .ok_or_else(|| anyhow::anyhow!("missing column, expected one of: {}",
                                           variants.join(", ")))
    }
}

/// Open a tab-delimited input and read its header.
pub fn open_tsv(path: &Path) -> anyhow::Result<(ColumnMap, TsvReader)> {
    let reader = open_input(path)?;

    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(b'\t')
        .quoting(false)
        .flexible(true)
        .from_reader(reader);

    let header = csv_reader.headers()
        .with_context(|| format!("failed to read header of {}", path.display()))?
        .clone();

    Ok((ColumnMap::from_header(&header), csv_reader))
}

/// A field value, or None when the column is absent, the value is empty or
/// it is the "-" placeholder.
pub fn field(record: &StringRecord, idx: Option<usize>) -> Option<&str> {
    let value = record.get(idx?)?.trim();
    if value.is_empty() || value == "-" {
        None
    } else {
        Some(value)
    }
}

pub fn parse_f64(value: Option<&str>) -> Option<f64> {
    match value? {
        "NA" | "NaN" | "NR" | "nan" => None,
        value => value.parse::<f64>().ok().filter(|v| v.is_finite()),
    }
}

pub fn parse_i64(value: Option<&str>) -> Option<i64> {
    value?.parse::<i64>().ok()
}

// counts are non-negative integers, anything else reads as zero
pub fn parse_count(value: Option<&str>) -> i64 {
    value.and_then(|v| v.parse::<u32>().ok())
        .map(i64::from)
        .unwrap_or(0)
}

/// Truncate to at most `max_chars` characters.
pub fn truncate(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => value[..byte_idx].to_owned(),
        None => value.to_owned(),
    }
}

pub fn truncate_opt(value: Option<&str>, max_chars: usize) -> Option<String> {
    value.map(|v| truncate(v, max_chars))
}

/// Fixed-size batches of rows, each written in its own transaction.
pub struct Batch<T> {
    rows: Vec<T>,
    batch_size: usize,
}

impl<T> Batch<T> {
    pub fn new(batch_size: usize) -> Batch<T> {
        let batch_size = batch_size.max(1);
        Batch {
            rows: Vec::with_capacity(batch_size),
            batch_size,
        }
    }

    /// Add a row, returning the full batch when it reaches the batch size.
    pub fn push(&mut self, row: T) -> Option<Vec<T>> {
        self.rows.push(row);
        if self.rows.len() >= self.batch_size {
            Some(std::mem::replace(&mut self.rows, Vec::with_capacity(self.batch_size)))
        } else {
            None
        }
    }

    pub fn finish(self) -> Vec<T> {
        self.rows
    }
}

#[derive(Serialize, Clone, Debug, Default, PartialEq)]
pub struct LoadStats {
    pub source: String,
    pub rows_read: usize,
    pub inserted: usize,
    // malformed or incomplete rows
    pub skipped: usize,
    // well-formed rows outside the loader's scope (species, significance...)
    pub filtered: usize,
    pub duplicates: usize,
    pub matches: MatchStats,
}

impl LoadStats {
    pub fn new(source: &str) -> LoadStats {
        LoadStats {
            source: source.to_owned(),
            ..Default::default()
        }
    }

    pub fn log(&self) {
        tracing::info!(source = %self.source,
                       rows_read = self.rows_read,
                       inserted = self.inserted,
                       skipped = self.skipped,
                       filtered = self.filtered,
                       duplicates = self.duplicates,
                       matched = self.matches.matched(),
                       unmatched = self.matches.unmatched,
                       match_rate = self.matches.match_rate(),
                       "load finished");
    }
}
