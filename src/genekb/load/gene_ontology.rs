use std::collections::HashSet;
use std::path::Path;

use rusqlite::Connection;

use crate::constants::GENE2GO_MIN_FIELDS;
use crate::data_types::{OntologyCategory, OntologyTerm};
use crate::db::bump_freshness;
use crate::load::{field, open_tsv, Batch, LoadStats};
use crate::types::GeneId;

pub fn catalog_gene_ids(conn: &Connection) -> rusqlite::Result<HashSet<GeneId>> {
    let mut stmt = conn.prepare("SELECT gene_id FROM genes")?;
    let gene_ids = stmt.query_map((), |row| row.get(0))?
        .collect::<rusqlite::Result<HashSet<GeneId>>>()?;
    Ok(gene_ids)
}

fn insert_terms(conn: &mut Connection, terms: &[OntologyTerm]) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    {
        let mut stmt =
            tx.prepare_cached("INSERT INTO gene_go_terms (gene_id, go_id, go_term, category)
                               VALUES (?1, ?2, ?3, ?4)")?;
        for term in terms {
            stmt.execute((term.gene_id, &term.go_id, &term.go_term, term.category.as_str()))?;
        }
    }
    tx.commit()
}

/// Load ontology annotations for genes already in the catalog, replacing
/// existing annotations.
pub fn load_gene_ontology(conn: &mut Connection, path: &Path, batch_size: usize)
                          -> anyhow::Result<LoadStats>
{
    let (columns, mut reader) = open_tsv(path)?;

    let gene_id_idx = columns.require(&["GeneID", "gene_id"])?;
    let go_id_idx = columns.require(&["GO_ID"])?;
    let go_term_idx = columns.require(&["GO_term"])?;
    let category_idx = columns.require(&["Category"])?;

    let gene_ids = catalog_gene_ids(conn)?;

    conn.execute("DELETE FROM gene_go_terms", ())?;

    let mut stats = LoadStats::new("gene2go");
    let mut batch = Batch::new(batch_size);

    for result in reader.records() {
        stats.rows_read += 1;

        let Ok(record) = result else {
            stats.skipped += 1;
            continue;
        };

        if record.len() < GENE2GO_MIN_FIELDS {
            stats.skipped += 1;
            continue;
        }

        let Some(gene_id) = field(&record, Some(gene_id_idx))
            .and_then(|v| v.parse::<GeneId>().ok())
        else {
            stats.skipped += 1;
            continue;
        };

        if !gene_ids.contains(&gene_id) {
            stats.filtered += 1;
            continue;
        }

        let go_id = field(&record, Some(go_id_idx));
        let go_term = field(&record, Some(go_term_idx));
        let category = field(&record, Some(category_idx))
            .and_then(|v| v.parse::<OntologyCategory>().ok());

        let (Some(go_id), Some(go_term), Some(category)) = (go_id, go_term, category) else {
            stats.skipped += 1;
            continue;
        };

        stats.inserted += 1;

        let term = OntologyTerm {
            gene_id,
            go_id: go_id.to_owned(),
            go_term: go_term.to_owned(),
            category,
        };

        if let Some(rows) = batch.push(term) {
            insert_terms(conn, &rows)?;
        }
    }

    insert_terms(conn, &batch.finish())?;
    bump_freshness(conn)?;

    stats.log();

    Ok(stats)
}
