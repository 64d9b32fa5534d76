use rusqlite::{params_from_iter, Connection};
use rusqlite::types::Value;

use flexstr::SharedStr as FlexStr;

use crate::api::facets::{compile, FacetSet, BEST_LOEUF_SQL, BEST_PLI_SQL};
use crate::api::search_utils::{escape_like, fts_prefix_query, normalize_query, Pagination};
use crate::constants::*;
use crate::data_types::{GeneSearchResult, SearchResponse};

lazy_static! {
    // per-result lookups, keyed by gene id
    static ref ENRICHMENT_COLUMNS: String = format!(
        "(SELECT COUNT(*) FROM gene_traits gt WHERE gt.gene_id = g.gene_id) AS trait_count,
         ({}) AS pli,
         ({}) AS loeuf,
         (SELECT MAX(cv.pathogenic_alleles) FROM clinvar_gene_summary cv
          WHERE cv.gene_id = g.gene_id) AS clinvar_pathogenic",
        *BEST_PLI_SQL, *BEST_LOEUF_SQL);

    static ref SNIPPET_SQL: String =
        format!("snippet(gene_fts, 1, '{}', '{}', '{}', {})",
                SNIPPET_OPEN, SNIPPET_CLOSE, SNIPPET_ELLIPSIS, SNIPPET_TOKENS);
}

const GENE_COLUMNS: &str =
    "g.gene_id, g.tax_id, g.symbol, g.name, g.chromosome, g.map_location,
     g.description, g.gene_type, s.common_name AS species_name";

const RANKED_FROM: &str =
    "FROM gene_fts
     JOIN genes g ON g.gene_id = gene_fts.rowid
     LEFT JOIN species s ON s.tax_id = g.tax_id";

const SUBSTRING_FROM: &str =
    "FROM genes g
     LEFT JOIN species s ON s.tax_id = g.tax_id";

const SUBSTRING_MATCH_SQL: &str =
    "(g.symbol LIKE ? ESCAPE '!' OR g.name LIKE ? ESCAPE '!' OR g.description LIKE ? ESCAPE '!')";

fn where_clause(text_match: &str, facet_clauses: &[&str]) -> String {
    if facet_clauses.is_empty() {
        text_match.to_owned()
    } else {
        format!("{} AND {}", text_match, itertools::join(facet_clauses, " AND "))
    }
}

pub(crate) fn flex(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Option<FlexStr>> {
    Ok(row.get::<_, Option<String>>(idx)?.map(FlexStr::from))
}

fn result_from_row(row: &rusqlite::Row) -> rusqlite::Result<GeneSearchResult> {
    Ok(GeneSearchResult {
        gene_id: row.get(0)?,
        tax_id: row.get(1)?,
        symbol: row.get::<_, String>(2)?.into(),
        name: flex(row, 3)?,
        chromosome: flex(row, 4)?,
        map_location: flex(row, 5)?,
        description: flex(row, 6)?,
        gene_type: flex(row, 7)?,
        species_name: flex(row, 8)?,
        matched_text: row.get(9)?,
        trait_count: row.get(10)?,
        pli: row.get(11)?,
        loeuf: row.get(12)?,
        clinvar_pathogenic: row.get(13)?,
    })
}

fn run_search(conn: &Connection, from: &str, text_match: &str, text_params: Vec<Value>,
              excerpt_sql: &str, order_by: &str, facets: &FacetSet, pagination: Pagination)
              -> rusqlite::Result<(Vec<GeneSearchResult>, usize)>
{
    let (facet_clauses, facet_params) = compile(&facets.predicates());
    let where_sql = where_clause(text_match, &facet_clauses);

    let mut params = text_params;
    params.extend(facet_params);

    let count_sql = format!("SELECT COUNT(*) {} WHERE {}", from, where_sql);
    let total: i64 = conn.query_row(&count_sql, params_from_iter(params.iter()),
                                    |row| row.get(0))?;

    let page_sql = format!("SELECT {}, {} AS matched_text, {} {} WHERE {} ORDER BY {} LIMIT ? OFFSET ?",
                           GENE_COLUMNS, excerpt_sql, *ENRICHMENT_COLUMNS, from,
                           where_sql, order_by);

    params.push(Value::Integer(pagination.per_page as i64));
    params.push(Value::Integer(pagination.offset()));

    let mut stmt = conn.prepare(&page_sql)?;
    let results = stmt.query_map(params_from_iter(params.iter()), result_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok((results, total as usize))
}

fn ranked_search(conn: &Connection, q: &str, facets: &FacetSet, pagination: Pagination)
                 -> rusqlite::Result<(Vec<GeneSearchResult>, usize)>
{
    run_search(conn, RANKED_FROM, "gene_fts MATCH ?", vec![Value::Text(fts_prefix_query(q))],
               &SNIPPET_SQL, "gene_fts.rank, g.gene_id", facets, pagination)
}

fn substring_search(conn: &Connection, q: &str, facets: &FacetSet, pagination: Pagination)
                    -> rusqlite::Result<(Vec<GeneSearchResult>, usize)>
{
    let pattern = format!("%{}%", escape_like(q));
    let text_params = vec![Value::Text(pattern.clone()), Value::Text(pattern.clone()),
                           Value::Text(pattern)];
    run_search(conn, SUBSTRING_FROM, SUBSTRING_MATCH_SQL, text_params, "NULL",
               "g.gene_id", facets, pagination)
}

/// Faceted free-text search.  Results are ranked by the full-text index when
/// it can be used.  Otherwise a substring match over symbol, name and
/// description is returned in gene id order with `ranked` set to false.
pub fn search(conn: &Connection, q: &str, facets: &FacetSet, pagination: Pagination)
              -> rusqlite::Result<SearchResponse>
{
    let query = normalize_query(q);

    if query.is_empty() {
        return Ok(SearchResponse::empty(&query, pagination.page, pagination.per_page));
    }

    let (results, total, ranked) =
        match ranked_search(conn, &query, facets, pagination) {
            Ok((results, total)) => (results, total, true),
            Err(err) => {
                tracing::warn!(query = %query, "full-text search failed, using substring match: {}", err);
                let (results, total) = substring_search(conn, &query, facets, pagination)?;
                (results, total, false)
            }
        };

    Ok(SearchResponse {
        results,
        query,
        page: pagination.page,
        per_page: pagination.per_page,
        total,
        ranked,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::db::create_schema;

    fn catalog() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        create_schema(&conn).unwrap();
        conn.execute_batch("
            INSERT INTO species (tax_id, name, common_name, gene_count) VALUES (9606, 'Homo sapiens', 'Human', 2);
            INSERT INTO genes (gene_id, tax_id, symbol, name, description, gene_type)
              VALUES (1, 9606, 'BRCA1', 'BRCA1 DNA repair associated', 'tumor suppressor', 'protein-coding');
            INSERT INTO genes (gene_id, tax_id, symbol, name, description, gene_type)
              VALUES (2, 9606, 'TP53', 'tumor protein p53', '100% conserved_site', 'protein-coding');
        ").unwrap();
        conn
    }

    #[test]
    fn blank_query() {
        let conn = catalog();
        let response = search(&conn, "  \t ", &FacetSet::default(), Pagination::default()).unwrap();
        assert_eq!(response.total, 0);
        assert!(response.results.is_empty());
    }

    #[test]
    fn substring_fallback_without_index() {
        let conn = catalog();
        let response = search(&conn, "tumor", &FacetSet::default(), Pagination::default()).unwrap();
        assert!(!response.ranked);
        assert_eq!(response.total, 2);
        let ids: Vec<_> = response.results.iter().map(|r| r.gene_id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(response.results.iter().all(|r| r.matched_text.is_none()));
        assert_eq!(response.results[0].species_name.as_ref().map(FlexStr::as_str), Some("Human"));
    }

    #[test]
    fn fallback_escapes_wildcards() {
        let conn = catalog();
        let response = search(&conn, "100%", &FacetSet::default(), Pagination::default()).unwrap();
        assert_eq!(response.total, 1);
        let response = search(&conn, "_", &FacetSet::default(), Pagination::default()).unwrap();
        assert_eq!(response.total, 1);
        assert_eq!(response.results[0].gene_id, 2);
    }
}
