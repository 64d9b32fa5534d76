use std::fmt;
use std::path::Path;
use std::time::UNIX_EPOCH;

use rusqlite::{Connection, OpenFlags, OptionalExtension};
use serde::Serialize;

use crate::types::TaxonId;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS species (
    tax_id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    common_name TEXT,
    gene_count INTEGER DEFAULT 0
);

CREATE TABLE IF NOT EXISTS genes (
    gene_id INTEGER PRIMARY KEY,
    tax_id INTEGER NOT NULL,
    symbol TEXT NOT NULL,
    name TEXT,
    chromosome TEXT,
    map_location TEXT,
    description TEXT,
    gene_type TEXT,
    FOREIGN KEY (tax_id) REFERENCES species(tax_id)
);

CREATE TABLE IF NOT EXISTS gene_synonyms (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    gene_id INTEGER NOT NULL,
    synonym TEXT NOT NULL,
    FOREIGN KEY (gene_id) REFERENCES genes(gene_id)
);

CREATE TABLE IF NOT EXISTS gene_go_terms (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    gene_id INTEGER NOT NULL,
    go_id TEXT NOT NULL,
    go_term TEXT NOT NULL,
    category TEXT,
    FOREIGN KEY (gene_id) REFERENCES genes(gene_id)
);

CREATE TABLE IF NOT EXISTS gene_summaries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    gene_id INTEGER NOT NULL UNIQUE,
    summary TEXT NOT NULL,
    source TEXT,
    FOREIGN KEY (gene_id) REFERENCES genes(gene_id)
);

CREATE TABLE IF NOT EXISTS gene_constraints (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    gene_id INTEGER,
    gene_symbol TEXT NOT NULL,
    transcript TEXT,
    pli REAL,
    loeuf REAL,
    loeuf_lower REAL,
    loeuf_upper REAL,
    oe_lof REAL,
    oe_mis REAL,
    oe_mis_lower REAL,
    oe_mis_upper REAL,
    mis_z REAL,
    oe_syn REAL,
    syn_z REAL,
    gnomad_version TEXT,
    FOREIGN KEY (gene_id) REFERENCES genes(gene_id)
);

CREATE TABLE IF NOT EXISTS clinvar_gene_summary (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    gene_id INTEGER,
    gene_symbol TEXT NOT NULL,
    total_submissions INTEGER DEFAULT 0,
    total_alleles INTEGER DEFAULT 0,
    pathogenic_alleles INTEGER DEFAULT 0,
    uncertain_alleles INTEGER DEFAULT 0,
    conflicting_alleles INTEGER DEFAULT 0,
    gene_mim_number TEXT,
    FOREIGN KEY (gene_id) REFERENCES genes(gene_id)
);

CREATE TABLE IF NOT EXISTS clinvar_variants (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    allele_id INTEGER NOT NULL,
    variation_id INTEGER,
    gene_id INTEGER,
    gene_symbol TEXT,
    variant_name TEXT,
    variant_type TEXT,
    clinical_significance TEXT,
    review_status TEXT,
    phenotype_list TEXT,
    chromosome TEXT,
    start_pos INTEGER,
    stop_pos INTEGER,
    reference_allele TEXT,
    alternate_allele TEXT,
    rs_id INTEGER,
    last_evaluated TEXT,
    origin TEXT,
    assembly TEXT,
    FOREIGN KEY (gene_id) REFERENCES genes(gene_id)
);

CREATE TABLE IF NOT EXISTS corpus_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_genes_symbol ON genes(symbol);
CREATE INDEX IF NOT EXISTS idx_genes_chromosome ON genes(chromosome);
CREATE INDEX IF NOT EXISTS idx_genes_tax_id ON genes(tax_id);
CREATE INDEX IF NOT EXISTS idx_synonyms_gene ON gene_synonyms(gene_id);
CREATE INDEX IF NOT EXISTS idx_go_gene ON gene_go_terms(gene_id);
CREATE INDEX IF NOT EXISTS idx_summaries_gene ON gene_summaries(gene_id);
CREATE INDEX IF NOT EXISTS idx_constraints_gene ON gene_constraints(gene_id);
CREATE INDEX IF NOT EXISTS idx_constraints_symbol ON gene_constraints(gene_symbol);
CREATE INDEX IF NOT EXISTS idx_clinvar_summary_gene ON clinvar_gene_summary(gene_id);
CREATE INDEX IF NOT EXISTS idx_clinvar_variants_gene ON clinvar_variants(gene_id);
CREATE INDEX IF NOT EXISTS idx_clinvar_variants_significance ON clinvar_variants(clinical_significance);
";

// dropped and recreated by every trait import
pub const TRAIT_SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS gwas_studies (
    study_id TEXT PRIMARY KEY,
    pubmed_id TEXT,
    first_author TEXT,
    publication_date TEXT,
    journal TEXT,
    title TEXT,
    initial_sample_size TEXT,
    replication_sample_size TEXT
);

CREATE TABLE IF NOT EXISTS traits (
    trait_id INTEGER PRIMARY KEY AUTOINCREMENT,
    efo_trait TEXT,
    reported_trait TEXT UNIQUE
);

CREATE TABLE IF NOT EXISTS gene_traits (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    gene_id INTEGER,
    gene_symbol TEXT NOT NULL,
    trait_id INTEGER,
    reported_trait TEXT,
    efo_trait TEXT,
    p_value REAL,
    p_value_text TEXT,
    risk_allele TEXT,
    risk_allele_freq REAL,
    odds_ratio REAL,
    ci_text TEXT,
    chromosome TEXT,
    position INTEGER,
    snp_id TEXT,
    study_id TEXT,
    pubmed_id TEXT,
    sample_description TEXT,
    FOREIGN KEY (gene_id) REFERENCES genes(gene_id),
    FOREIGN KEY (trait_id) REFERENCES traits(trait_id),
    FOREIGN KEY (study_id) REFERENCES gwas_studies(study_id)
);

CREATE INDEX IF NOT EXISTS idx_gene_traits_gene_id ON gene_traits(gene_id);
CREATE INDEX IF NOT EXISTS idx_gene_traits_trait ON gene_traits(reported_trait);
";

const GENERATION_KEY: &str = "generation";
const UPDATED_AT_KEY: &str = "updated_at";

/// Create every relational table (the full-text index is created by the
/// corpus builder).
pub fn create_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute_batch(TRAIT_SCHEMA_SQL)?;
    Ok(())
}

/// Remove any existing database file and create an empty schema.
pub fn reset_database(path: &Path) -> anyhow::Result<Connection> {
    if path.exists() {
        std::fs::remove_file(path)?;
        tracing::info!(path = %path.display(), "removed existing database");
    }

    let conn = Connection::open(path)?;
    create_schema(&conn)?;

    Ok(conn)
}

pub fn open(path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    create_schema(&conn)?;
    Ok(conn)
}

// used by the query path, one connection per request
pub fn open_read_only(path: &Path) -> rusqlite::Result<Connection> {
    Connection::open_with_flags(path,
                                OpenFlags::SQLITE_OPEN_READ_ONLY |
                                OpenFlags::SQLITE_OPEN_NO_MUTEX)
}

pub fn table_exists(conn: &Connection, table_name: &str) -> rusqlite::Result<bool> {
    let count: i64 =
        conn.query_row("SELECT COUNT(*) FROM sqlite_master WHERE name = ?1 AND type IN ('table', 'view')",
                       [table_name], |row| row.get(0))?;
    Ok(count > 0)
}

/// Set `species.gene_count` from the genes table.
pub fn recompute_species_gene_counts(conn: &Connection) -> rusqlite::Result<usize> {
    conn.execute("UPDATE species SET gene_count =
                    (SELECT COUNT(*) FROM genes WHERE genes.tax_id = species.tax_id)",
                 ())
}

fn read_meta(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row("SELECT value FROM corpus_meta WHERE key = ?1", [key],
                   |row| row.get(0))
        .optional()
}

/// Advance the corpus freshness marker.  Called in the same transaction as
/// each build step's writes.
pub fn bump_freshness(conn: &Connection) -> rusqlite::Result<i64> {
    let generation = read_meta(conn, GENERATION_KEY)?
        .and_then(|value| value.parse::<i64>().ok())
        .unwrap_or(0) + 1;

    let updated_at = chrono::Utc::now().to_rfc3339();

    conn.execute("INSERT OR REPLACE INTO corpus_meta (key, value) VALUES (?1, ?2)",
                 (GENERATION_KEY, generation.to_string()))?;
    conn.execute("INSERT OR REPLACE INTO corpus_meta (key, value) VALUES (?1, ?2)",
                 (UPDATED_AT_KEY, &updated_at))?;

    Ok(generation)
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct FreshnessMarker {
    pub generation: i64,
    pub updated_at: Option<String>,
    pub file_mtime_nanos: Option<u128>,
}

impl fmt::Display for FreshnessMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.generation, self.updated_at.as_deref().unwrap_or(""))?;
        if let Some(mtime) = self.file_mtime_nanos {
            write!(f, ":{}", mtime)?;
        }
        Ok(())
    }
}

/// Read the freshness marker.  `db_path` is None for in-memory databases.
pub fn read_freshness(conn: &Connection, db_path: Option<&Path>)
                      -> rusqlite::Result<FreshnessMarker>
{
    let (generation, updated_at) =
        if table_exists(conn, "corpus_meta")? {
            let generation = read_meta(conn, GENERATION_KEY)?
                .and_then(|value| value.parse::<i64>().ok())
                .unwrap_or(0);
            (generation, read_meta(conn, UPDATED_AT_KEY)?)
        } else {
            (0, None)
        };

    let file_mtime_nanos = db_path
        .and_then(|path| std::fs::metadata(path).ok())
        .and_then(|metadata| metadata.modified().ok())
        .and_then(|modified| modified.duration_since(UNIX_EPOCH).ok())
        .map(|duration| duration.as_nanos());

    Ok(FreshnessMarker {
        generation,
        updated_at,
        file_mtime_nanos,
    })
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct SpeciesCountMismatch {
    pub tax_id: TaxonId,
    pub stored_count: i64,
    pub actual_count: i64,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct UnmatchedRatio {
    pub table_name: String,
    pub total: i64,
    pub unmatched: i64,
    pub ratio: f64,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct IntegrityReport {
    pub gene_count: i64,
    pub orphan_genes: i64,
    pub species_count_mismatches: Vec<SpeciesCountMismatch>,
    // None if the full-text index is missing
    pub document_count: Option<i64>,
    pub unmatched: Vec<UnmatchedRatio>,
}

impl IntegrityReport {
    pub fn corpus_matches_catalog(&self) -> bool {
        self.document_count == Some(self.gene_count)
    }

    pub fn is_consistent(&self) -> bool {
        self.orphan_genes == 0 && self.species_count_mismatches.is_empty() &&
            self.corpus_matches_catalog()
    }
}

const UNMATCHED_TABLES: [&str; 4] =
    ["gene_constraints", "clinvar_gene_summary", "clinvar_variants", "gene_traits"];

pub fn integrity_report(conn: &Connection) -> rusqlite::Result<IntegrityReport> {
    let gene_count: i64 = conn.query_row("SELECT COUNT(*) FROM genes", (), |row| row.get(0))?;

    let orphan_genes: i64 =
        conn.query_row("SELECT COUNT(*) FROM genes g
                        WHERE NOT EXISTS (SELECT 1 FROM species s WHERE s.tax_id = g.tax_id)",
                       (), |row| row.get(0))?;

    let mut stmt = conn.prepare("
        SELECT s.tax_id, s.gene_count,
               (SELECT COUNT(*) FROM genes g WHERE g.tax_id = s.tax_id) AS actual
        FROM species s
        WHERE COALESCE(s.gene_count, 0) !=
              (SELECT COUNT(*) FROM genes g WHERE g.tax_id = s.tax_id)
        ORDER BY s.tax_id")?;

    let species_count_mismatches = stmt.query_map((), |row| {
        Ok(SpeciesCountMismatch {
            tax_id: row.get(0)?,
            stored_count: row.get::<_, Option<i64>>(1)?.unwrap_or(0),
            actual_count: row.get(2)?,
        })
    })?.collect::<rusqlite::Result<Vec<_>>>()?;

    let document_count =
        if table_exists(conn, "gene_fts")? {
            Some(conn.query_row("SELECT COUNT(*) FROM gene_fts", (), |row| row.get(0))?)
        } else {
            None
        };

    let mut unmatched = vec![];

    for table_name in UNMATCHED_TABLES {
        if !table_exists(conn, table_name)? {
            continue;
        }
        let (total, missing): (i64, i64) =
            conn.query_row(&format!("SELECT COUNT(*), COUNT(*) - COUNT(gene_id) FROM {}", table_name),
                           (), |row| Ok((row.get(0)?, row.get(1)?)))?;
        let ratio = if total > 0 { missing as f64 / total as f64 } else { 0.0 };
        unmatched.push(UnmatchedRatio {
            table_name: table_name.to_owned(),
            total,
            unmatched: missing,
            ratio,
        });
    }

    Ok(IntegrityReport {
        gene_count,
        orphan_genes,
        species_count_mismatches,
        document_count,
        unmatched,
    })
}
