use std::path::Path;

use rusqlite::Connection;

use crate::constants::{GENE_SUMMARY_MIN_FIELDS, MIN_FUNCTIONAL_SUMMARY_LENGTH};
use crate::data_types::FunctionalSummary;
use crate::db::bump_freshness;
use crate::load::gene_ontology::catalog_gene_ids;
use crate::load::{field, open_tsv, Batch, LoadStats};
use crate::types::GeneId;

fn insert_summaries(conn: &mut Connection, summaries: &[FunctionalSummary]) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    {
        let mut stmt =
            tx.prepare_cached("INSERT OR REPLACE INTO gene_summaries (gene_id, summary, source)
                               VALUES (?1, ?2, ?3)")?;
        for summary in summaries {
            stmt.execute((summary.gene_id, &summary.summary, &summary.source))?;
        }
    }
    tx.commit()
}

/// Load functional summaries for catalog genes.  A later row for the same
/// gene replaces an earlier one.
pub fn load_gene_summaries(conn: &mut Connection, path: &Path, batch_size: usize)
                           -> anyhow::Result<LoadStats>
{
    let (columns, mut reader) = open_tsv(path)?;

    let gene_id_idx = columns.require(&["GeneID", "gene_id"])?;
    let summary_idx = columns.require(&["Summary", "summary"])?;
    let source_idx = columns.find(&["Source", "source"]);

    let gene_ids = catalog_gene_ids(conn)?;

    conn.execute("DELETE FROM gene_summaries", ())?;

    let mut stats = LoadStats::new("gene_summary");
    let mut batch = Batch::new(batch_size);

    for result in reader.records() {
        stats.rows_read += 1;

        let Ok(record) = result else {
            stats.skipped += 1;
            continue;
        };

        if record.len() < GENE_SUMMARY_MIN_FIELDS {
            stats.skipped += 1;
            continue;
        }

        let gene_id = field(&record, Some(gene_id_idx))
            .and_then(|v| v.parse::<GeneId>().ok());
        let summary = field(&record, Some(summary_idx));

        let (Some(gene_id), Some(summary)) = (gene_id, summary) else {
            stats.skipped += 1;
            continue;
        };

        if !gene_ids.contains(&gene_id) ||
            summary.chars().count() < MIN_FUNCTIONAL_SUMMARY_LENGTH
        {
            stats.filtered += 1;
            continue;
        }

        stats.inserted += 1;

        let functional_summary = FunctionalSummary {
            gene_id,
            summary: summary.to_owned(),
            source: field(&record, source_idx).map(str::to_owned),
        };

        if let Some(rows) = batch.push(functional_summary) {
            insert_summaries(conn, &rows)?;
        }
    }

    insert_summaries(conn, &batch.finish())?;
    bump_freshness(conn)?;

    stats.log();

    Ok(stats)
}
