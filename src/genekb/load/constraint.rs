use std::path::Path;

use rusqlite::Connection;

use crate::data_types::ConstraintRecord;
use crate::db::bump_freshness;
use crate::load::{field, open_tsv, parse_f64, Batch, ColumnMap, LoadStats};
use crate::resolve::SymbolMap;

/// Header names of one constraint release.  Each field lists the accepted
/// variants in order of preference.
pub struct ConstraintRelease {
    pub version: &'static str,
    symbol: &'static [&'static str],
    transcript: &'static [&'static str],
    pli: &'static [&'static str],
    loeuf: &'static [&'static str],
    loeuf_lower: &'static [&'static str],
    loeuf_upper: &'static [&'static str],
    oe_lof: &'static [&'static str],
    oe_mis: &'static [&'static str],
    oe_mis_lower: &'static [&'static str],
    oe_mis_upper: &'static [&'static str],
    mis_z: &'static [&'static str],
    oe_syn: &'static [&'static str],
    syn_z: &'static [&'static str],
}

pub const RELEASE_V4_1: ConstraintRelease = ConstraintRelease {
    version: "v4.1",
    symbol: &["gene", "symbol", "gene_symbol"],
    transcript: &["transcript", "canonical_transcript"],
    pli: &["lof.pLI", "pLI", "pli"],
    loeuf: &["lof.oe_ci.upper", "oe_lof_upper", "loeuf"],
    loeuf_lower: &["lof.oe_ci.lower", "oe_lof_lower"],
    loeuf_upper: &["lof.oe_ci.upper", "oe_lof_upper"],
    oe_lof: &["lof.oe", "oe_lof"],
    oe_mis: &["mis.oe", "oe_mis"],
    oe_mis_lower: &["mis.oe_ci.lower", "oe_mis_lower"],
    oe_mis_upper: &["mis.oe_ci.upper", "oe_mis_upper"],
    mis_z: &["mis.z_score", "mis_z"],
    oe_syn: &["syn.oe", "oe_syn"],
    syn_z: &["syn.z_score", "syn_z"],
};

pub const RELEASE_V2_1_1: ConstraintRelease = ConstraintRelease {
    version: "v2.1.1",
    symbol: &["gene"],
    transcript: &["transcript"],
    pli: &["pLI"],
    loeuf: &["oe_lof_upper"],
    loeuf_lower: &["oe_lof_lower"],
    loeuf_upper: &["oe_lof_upper"],
    oe_lof: &["oe_lof"],
    oe_mis: &["oe_mis"],
    oe_mis_lower: &["oe_mis_lower"],
    oe_mis_upper: &["oe_mis_upper"],
    mis_z: &["mis_z"],
    oe_syn: &["oe_syn"],
    syn_z: &["syn_z"],
};

pub fn release_by_version(version: &str) -> Option<&'static ConstraintRelease> {
    [&RELEASE_V4_1, &RELEASE_V2_1_1].into_iter()
        .find(|release| release.version == version)
}

struct ConstraintColumns {
    symbol: usize,
    transcript: Option<usize>,
    pli: Option<usize>,
    loeuf: Option<usize>,
    loeuf_lower: Option<usize>,
    loeuf_upper: Option<usize>,
    oe_lof: Option<usize>,
    oe_mis: Option<usize>,
    oe_mis_lower: Option<usize>,
    oe_mis_upper: Option<usize>,
    mis_z: Option<usize>,
    oe_syn: Option<usize>,
    syn_z: Option<usize>,
}

impl ConstraintColumns {
    fn new(columns: &ColumnMap, release: &ConstraintRelease) -> anyhow::Result<ConstraintColumns> {
        Ok(ConstraintColumns {
            symbol: columns.require(release.symbol)?,
            transcript: columns.find(release.transcript),
            pli: columns.find(release.pli),
            loeuf: columns.find(release.loeuf),
            loeuf_lower: columns.find(release.loeuf_lower),
            loeuf_upper: columns.find(release.loeuf_upper),
            oe_lof: columns.find(release.oe_lof),
            oe_mis: columns.find(release.oe_mis),
            oe_mis_lower: columns.find(release.oe_mis_lower),
            oe_mis_upper: columns.find(release.oe_mis_upper),
            mis_z: columns.find(release.mis_z),
            oe_syn: columns.find(release.oe_syn),
            syn_z: columns.find(release.syn_z),
        })
    }
}

// a probability outside [0, 1] is stored as null
fn probability(value: Option<f64>) -> Option<f64> {
    value.filter(|v| (0.0..=1.0).contains(v))
}

// observed/expected fractions can't be negative
fn fraction(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v >= 0.0)
}

fn insert_constraints(conn: &mut Connection, records: &[ConstraintRecord]) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare_cached("
            INSERT INTO gene_constraints
              (gene_id, gene_symbol, transcript, pli, loeuf, loeuf_lower, loeuf_upper,
               oe_lof, oe_mis, oe_mis_lower, oe_mis_upper, mis_z, oe_syn, syn_z, gnomad_version)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)")?;
        for r in records {
            stmt.execute(rusqlite::params![r.gene_id, r.gene_symbol, r.transcript, r.pli, r.loeuf,
                                           r.loeuf_lower, r.loeuf_upper, r.oe_lof, r.oe_mis,
                                           r.oe_mis_lower, r.oe_mis_upper, r.mis_z, r.oe_syn,
                                           r.syn_z, r.release])?;
        }
    }
    tx.commit()
}

/// Load one constraint release, replacing earlier rows of the same release.
/// Rows are matched by symbol only.
pub fn load_constraints(conn: &mut Connection, path: &Path, release: &ConstraintRelease,
                        symbol_map: &SymbolMap, batch_size: usize)
                        -> anyhow::Result<LoadStats>
{
    let (column_map, mut reader) = open_tsv(path)?;
    let columns = ConstraintColumns::new(&column_map, release)?;

    conn.execute("DELETE FROM gene_constraints WHERE gnomad_version = ?1", [release.version])?;

    let mut stats = LoadStats::new(&format!("constraint {}", release.version));
    let mut batch = Batch::new(batch_size);

    for result in reader.records() {
        stats.rows_read += 1;

        let Ok(record) = result else {
            stats.skipped += 1;
            continue;
        };

        let Some(symbol) = field(&record, Some(columns.symbol)) else {
            stats.skipped += 1;
            continue;
        };

        let resolution = symbol_map.resolve(Some(symbol), None);
        stats.matches.record(&resolution);

        let number = |idx: Option<usize>| parse_f64(field(&record, idx));

        let constraint = ConstraintRecord {
            gene_id: resolution.gene_id(),
            gene_symbol: symbol.to_owned(),
            transcript: field(&record, columns.transcript).map(str::to_owned),
            pli: probability(number(columns.pli)),
            loeuf: fraction(number(columns.loeuf)),
            loeuf_lower: fraction(number(columns.loeuf_lower)),
            loeuf_upper: fraction(number(columns.loeuf_upper)),
            oe_lof: fraction(number(columns.oe_lof)),
            oe_mis: fraction(number(columns.oe_mis)),
            oe_mis_lower: fraction(number(columns.oe_mis_lower)),
            oe_mis_upper: fraction(number(columns.oe_mis_upper)),
            mis_z: number(columns.mis_z),
            oe_syn: fraction(number(columns.oe_syn)),
            syn_z: number(columns.syn_z),
            release: release.version.to_owned(),
        };

        stats.inserted += 1;

        if let Some(rows) = batch.push(constraint) {
            insert_constraints(conn, &rows)?;
        }
    }

    insert_constraints(conn, &batch.finish())?;
    bump_freshness(conn)?;

    stats.log();

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges() {
        assert_eq!(probability(Some(0.95)), Some(0.95));
        assert_eq!(probability(Some(1.2)), None);
        assert_eq!(probability(Some(-0.1)), None);
        assert_eq!(fraction(Some(0.3)), Some(0.3));
        assert_eq!(fraction(Some(-0.3)), None);
        assert_eq!(fraction(None), None);
    }

    #[test]
    fn releases() {
        assert_eq!(release_by_version("v4.1").map(|r| r.version), Some("v4.1"));
        assert_eq!(release_by_version("v2.1.1").map(|r| r.version), Some("v2.1.1"));
        assert!(release_by_version("v3").is_none());
    }
}
