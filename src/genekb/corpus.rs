use std::collections::HashMap;

use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};

use crate::data_types::SearchDocument;
use crate::db::{bump_freshness, table_exists};
use crate::types::GeneId;

const CREATE_INDEX_SQL: &str = "
CREATE VIRTUAL TABLE gene_fts USING fts5(
    gene_id UNINDEXED,
    searchable_text,
    tokenize='porter unicode61'
)";

// the rowid of each index entry is the gene id
const INSERT_DOCUMENT_SQL: &str =
    "INSERT INTO gene_fts (rowid, gene_id, searchable_text) VALUES (?1, ?1, ?2)";

const DELETE_DOCUMENT_SQL: &str = "DELETE FROM gene_fts WHERE rowid = ?1";

struct GeneText {
    gene_id: GeneId,
    symbol: String,
    name: Option<String>,
    description: Option<String>,
    chromosome: Option<String>,
}

fn gene_text_from_row(row: &rusqlite::Row) -> rusqlite::Result<GeneText> {
    Ok(GeneText {
        gene_id: row.get(0)?,
        symbol: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        chromosome: row.get(4)?,
    })
}

fn compose_document(gene: &GeneText, synonyms: &[String], go_terms: &[String],
                    trait_names: &[String])
                    -> String
{
    let mut parts: Vec<&str> = vec![gene.symbol.as_str(), gene.symbol.as_str()];

    parts.extend(gene.name.as_deref());
    parts.extend(gene.description.as_deref());
    parts.extend(synonyms.iter().map(String::as_str));
    parts.extend(go_terms.iter().map(String::as_str));

    let chromosome_token = gene.chromosome.as_ref()
        .filter(|chromosome| !chromosome.is_empty())
        .map(|chromosome| format!("chromosome {}", chromosome));
    parts.extend(chromosome_token.as_deref());

    parts.extend(trait_names.iter().map(String::as_str));

    parts.join(" ")
}

fn grouped_text(conn: &Connection, sql: &str) -> rusqlite::Result<HashMap<GeneId, Vec<String>>> {
    let mut grouped: HashMap<GeneId, Vec<String>> = HashMap::new();
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(())?;
    while let Some(row) = rows.next()? {
        grouped.entry(row.get(0)?).or_default().push(row.get(1)?);
    }
    Ok(grouped)
}

fn group_of(grouped: &HashMap<GeneId, Vec<String>>, gene_id: GeneId) -> &[String] {
    grouped.get(&gene_id).map(Vec::as_slice).unwrap_or(&[])
}

fn text_list(conn: &Connection, sql: &str, gene_id: GeneId) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let values = stmt.query_map([gene_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(values)
}

pub fn index_available(conn: &Connection) -> rusqlite::Result<bool> {
    table_exists(conn, "gene_fts")
}

/// Maintains one search document per gene.  The full rebuild and the
/// per-gene replacement compose documents with the same function, so a
/// replaced document is identical to the one a full rebuild would write.
pub struct CorpusBuilder {
    batch_size: usize,
}

impl CorpusBuilder {
    pub fn new(batch_size: usize) -> CorpusBuilder {
        CorpusBuilder {
            batch_size: batch_size.max(1),
        }
    }

    /// Compose the current document for one gene, or None if the gene is
    /// not in the catalog.
    pub fn document_for(&self, conn: &Connection, gene_id: GeneId)
                        -> rusqlite::Result<Option<SearchDocument>>
    {
        let gene = conn.prepare_cached("SELECT gene_id, symbol, name, description, chromosome
                                        FROM genes WHERE gene_id = ?1")?
            .query_row([gene_id], gene_text_from_row)
            .optional()?;

        let Some(gene) = gene else {
            return Ok(None);
        };

        let synonyms = text_list(conn, "SELECT synonym FROM gene_synonyms
                                        WHERE gene_id = ?1 ORDER BY id", gene_id)?;
        let go_terms = text_list(conn, "SELECT go_term FROM gene_go_terms
                                        WHERE gene_id = ?1 ORDER BY id", gene_id)?;
        let trait_names =
            if table_exists(conn, "gene_traits")? {
                text_list(conn, "SELECT DISTINCT reported_trait FROM gene_traits
                                 WHERE gene_id = ?1 AND reported_trait IS NOT NULL
                                 ORDER BY reported_trait", gene_id)?
            } else {
                vec![]
            };

        Ok(Some(SearchDocument {
            gene_id,
            searchable_text: compose_document(&gene, &synonyms, &go_terms, &trait_names),
        }))
    }

    fn all_documents(&self, conn: &Connection) -> rusqlite::Result<Vec<SearchDocument>> {
        let synonyms = grouped_text(conn, "SELECT gene_id, synonym FROM gene_synonyms
                                           ORDER BY gene_id, id")?;
        let go_terms = grouped_text(conn, "SELECT gene_id, go_term FROM gene_go_terms
                                           ORDER BY gene_id, id")?;
        let trait_names =
            if table_exists(conn, "gene_traits")? {
                grouped_text(conn, "SELECT DISTINCT gene_id, reported_trait FROM gene_traits
                                    WHERE gene_id IS NOT NULL AND reported_trait IS NOT NULL
                                    ORDER BY gene_id, reported_trait")?
            } else {
                HashMap::new()
            };

        let mut stmt = conn.prepare("SELECT gene_id, symbol, name, description, chromosome
                                     FROM genes ORDER BY gene_id")?;
        let genes = stmt.query_map((), gene_text_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let documents = genes.iter()
            .map(|gene| SearchDocument {
                gene_id: gene.gene_id,
                searchable_text: compose_document(gene,
                                                  group_of(&synonyms, gene.gene_id),
                                                  group_of(&go_terms, gene.gene_id),
                                                  group_of(&trait_names, gene.gene_id)),
            })
            .collect();

        Ok(documents)
    }

    fn write_documents(&self, conn: &mut Connection, documents: &[SearchDocument])
                       -> rusqlite::Result<()>
    {
        for chunk in documents.chunks(self.batch_size) {
            let tx = conn.transaction()?;
            {
                let mut delete_stmt = tx.prepare_cached(DELETE_DOCUMENT_SQL)?;
                let mut insert_stmt = tx.prepare_cached(INSERT_DOCUMENT_SQL)?;
                for document in chunk {
                    delete_stmt.execute([document.gene_id])?;
                    insert_stmt.execute((document.gene_id, &document.searchable_text))?;
                }
            }
            tx.commit()?;
        }
        Ok(())
    }

    /// Drop the index and recompute every document from the relational
    /// tables.  Returns the number of documents written.
    pub fn rebuild_all(&self, conn: &mut Connection) -> anyhow::Result<usize> {
        let documents = self.all_documents(conn)?;

        let tx = conn.transaction()?;
        tx.execute("DROP TABLE IF EXISTS gene_fts", ())?;
        tx.execute(CREATE_INDEX_SQL, ())
            .context("full-text index unavailable, the relational data is unchanged")?;
        tx.commit()?;

        self.write_documents(conn, &documents)?;
        bump_freshness(conn)?;

        tracing::info!(documents = documents.len(), "rebuilt search corpus");

        Ok(documents.len())
    }

    /// Delete and reinsert the documents of the given genes, leaving all
    /// other documents untouched.  Ids not in the catalog lose their
    /// document.
    pub fn replace_documents(&self, conn: &mut Connection, gene_ids: &[GeneId])
                             -> anyhow::Result<usize>
    {
        if !index_available(conn)? {
            anyhow::bail!("full-text index is missing, a full corpus rebuild is needed");
        }

        let mut replaced = 0;

        for chunk in gene_ids.chunks(self.batch_size) {
            let mut documents = Vec::with_capacity(chunk.len());
            let mut removed = vec![];

            for gene_id in chunk {
                match self.document_for(conn, *gene_id)? {
                    Some(document) => documents.push(document),
                    None => removed.push(*gene_id),
                }
            }

            self.write_documents(conn, &documents)?;

            if !removed.is_empty() {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare_cached(DELETE_DOCUMENT_SQL)?;
                    for gene_id in &removed {
                        stmt.execute([gene_id])?;
                    }
                }
                tx.commit()?;
            }

            replaced += documents.len();
        }

        bump_freshness(conn)?;

        tracing::info!(requested = gene_ids.len(), replaced, "replaced search documents");

        Ok(replaced)
    }
}

/// All indexed documents, ordered by gene id.
pub fn read_documents(conn: &Connection) -> rusqlite::Result<Vec<SearchDocument>> {
    let mut stmt = conn.prepare("SELECT rowid, searchable_text FROM gene_fts ORDER BY rowid")?;
    let documents = stmt.query_map((), |row| {
        Ok(SearchDocument {
            gene_id: row.get(0)?,
            searchable_text: row.get(1)?,
        })
    })?.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gene(chromosome: Option<&str>) -> GeneText {
        GeneText {
            gene_id: 672,
            symbol: "BRCA1".into(),
            name: Some("BRCA1 DNA repair associated".into()),
            description: Some("tumor suppressor".into()),
            chromosome: chromosome.map(str::to_owned),
        }
    }

    #[test]
    fn document_order() {
        let text = compose_document(&gene(Some("17")),
                                    &["RNF53".into(), "IRIS".into()],
                                    &["DNA repair".into()],
                                    &["Breast cancer".into()]);
        assert_eq!(text, "BRCA1 BRCA1 BRCA1 DNA repair associated tumor suppressor \
                          RNF53 IRIS DNA repair chromosome 17 Breast cancer");
    }

    #[test]
    fn no_chromosome_token() {
        let text = compose_document(&gene(None), &[], &[], &[]);
        assert!(!text.contains("chromosome"));
        let text = compose_document(&gene(Some("")), &[], &[], &[]);
        assert!(!text.contains("chromosome"));
    }
}
