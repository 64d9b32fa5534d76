use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

use rusqlite::Connection;

use crate::constants::{TRAIT_GENE_PLACEHOLDERS, TRAIT_GENE_SEPARATORS};
use crate::data_types::{GeneTraitAssociation, Study, Trait};
use crate::db::{bump_freshness, table_exists, TRAIT_SCHEMA_SQL};
use crate::load::{field, open_tsv, parse_f64, LoadStats};
use crate::resolve::SymbolMap;
use crate::types::GeneId;

/// Split a reported gene field on the first separator it contains.
pub fn split_gene_field(gene_field: &str) -> Vec<String> {
    let parts: Vec<&str> =
        match TRAIT_GENE_SEPARATORS.iter().find(|sep| gene_field.contains(*sep)) {
            Some(sep) => gene_field.split(sep).collect(),
            None => vec![gene_field],
        };

    parts.into_iter()
        .map(|symbol| symbol.trim().to_uppercase())
        .filter(|symbol| !symbol.is_empty() && !TRAIT_GENE_PLACEHOLDERS.contains(&symbol.as_str()))
        .collect()
}

#[derive(Default)]
struct PendingTraitRows {
    traits: Vec<Trait>,
    studies: Vec<Study>,
    associations: Vec<GeneTraitAssociation>,
}

impl PendingTraitRows {
    fn write(&mut self, conn: &mut Connection) -> rusqlite::Result<()> {
        let tx = conn.transaction()?;
        {
            let mut trait_stmt =
                tx.prepare_cached("INSERT OR IGNORE INTO traits (trait_id, efo_trait, reported_trait)
                                   VALUES (?1, ?2, ?3)")?;
            for t in &self.traits {
                trait_stmt.execute((t.trait_id, &t.efo_trait, &t.reported_trait))?;
            }

            let mut study_stmt = tx.prepare_cached("
                INSERT OR IGNORE INTO gwas_studies
                  (study_id, pubmed_id, first_author, publication_date, journal, title,
                   initial_sample_size, replication_sample_size)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)")?;
            for s in &self.studies {
                study_stmt.execute((&s.study_id, &s.pubmed_id, &s.first_author,
                                    &s.publication_date, &s.journal, &s.title,
                                    &s.initial_sample_size, &s.replication_sample_size))?;
            }

            let mut assoc_stmt = tx.prepare_cached("
                INSERT INTO gene_traits
                  (gene_id, gene_symbol, trait_id, reported_trait, efo_trait, p_value, p_value_text,
                   risk_allele, risk_allele_freq, odds_ratio, ci_text, chromosome, position,
                   snp_id, study_id, pubmed_id, sample_description)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)")?;
            for a in &self.associations {
                assoc_stmt.execute(rusqlite::params![a.gene_id, a.gene_symbol, a.trait_id,
                                                     a.reported_trait, a.efo_trait, a.p_value,
                                                     a.p_value_text, a.risk_allele,
                                                     a.risk_allele_freq, a.odds_ratio, a.ci_text,
                                                     a.chromosome, a.position, a.snp_id,
                                                     a.study_id, a.pubmed_id,
                                                     a.sample_description])?;
            }
        }
        tx.commit()?;

        self.traits.clear();
        self.studies.clear();
        self.associations.clear();

        Ok(())
    }
}

fn associated_genes(conn: &Connection) -> rusqlite::Result<BTreeSet<GeneId>> {
    if !table_exists(conn, "gene_traits")? {
        return Ok(BTreeSet::new());
    }

    let mut stmt = conn.prepare("SELECT DISTINCT gene_id FROM gene_traits WHERE gene_id IS NOT NULL")?;
    let gene_ids = stmt.query_map((), |row| row.get(0))?
        .collect::<rusqlite::Result<BTreeSet<GeneId>>>()?;
    Ok(gene_ids)
}

pub struct TraitImport {
    pub stats: LoadStats,
    pub trait_count: usize,
    pub study_count: usize,
    // genes with a matched association before or after the import, ascending
    pub affected_genes: Vec<GeneId>,
}

/// Replace all trait, study and association data.  The caller is expected
/// to refresh the search documents of `affected_genes`.
pub fn load_trait_associations(conn: &mut Connection, path: &Path, symbol_map: &SymbolMap,
                               batch_size: usize)
                               -> anyhow::Result<TraitImport>
{
    let (columns, mut reader) = open_tsv(path)?;

    let trait_idx = columns.require(&["DISEASE/TRAIT"])?;
    let reported_genes_idx = columns.find(&["REPORTED GENE(S)"]);
    let mapped_genes_idx = columns.find(&["MAPPED_GENE"]);
    if reported_genes_idx.is_none() && mapped_genes_idx.is_none() {
        anyhow::bail!("{}: no REPORTED GENE(S) or MAPPED_GENE column", path.display());
    }
    let efo_trait_idx = columns.find(&["MAPPED_TRAIT"]);
    let study_idx = columns.find(&["STUDY ACCESSION"]);
    let pubmed_idx = columns.find(&["PUBMEDID"]);
    let first_author_idx = columns.find(&["FIRST AUTHOR"]);
    let date_idx = columns.find(&["DATE"]);
    let journal_idx = columns.find(&["JOURNAL"]);
    let title_idx = columns.find(&["STUDY"]);
    let initial_sample_idx = columns.find(&["INITIAL SAMPLE SIZE"]);
    let replication_sample_idx = columns.find(&["REPLICATION SAMPLE SIZE"]);
    let p_value_idx = columns.find(&["P-VALUE"]);
    let risk_allele_idx = columns.find(&["STRONGEST SNP-RISK ALLELE"]);
    let risk_freq_idx = columns.find(&["RISK ALLELE FREQUENCY"]);
    let odds_ratio_idx = columns.find(&["OR or BETA"]);
    let ci_idx = columns.find(&["95% CI (TEXT)"]);
    let chromosome_idx = columns.find(&["CHR_ID"]);
    let position_idx = columns.find(&["CHR_POS"]);
    let snp_idx = columns.find(&["SNPS"]);

    let mut affected_genes = associated_genes(conn)?;

    conn.execute_batch("DROP TABLE IF EXISTS gene_traits;
                        DROP TABLE IF EXISTS traits;
                        DROP TABLE IF EXISTS gwas_studies;")?;
    conn.execute_batch(TRAIT_SCHEMA_SQL)?;

    let mut stats = LoadStats::new("gwas");
    let mut trait_ids: HashMap<String, i64> = HashMap::new();
    let mut studies_seen: HashSet<String> = HashSet::new();
    let mut pending = PendingTraitRows::default();

    for result in reader.records() {
        stats.rows_read += 1;

        let Ok(record) = result else {
            stats.skipped += 1;
            continue;
        };

        let gene_field = field(&record, reported_genes_idx)
            .or_else(|| field(&record, mapped_genes_idx));

        let symbols = match gene_field {
            Some(gene_field) => split_gene_field(gene_field),
            None => vec![],
        };

        if symbols.is_empty() {
            stats.filtered += 1;
            continue;
        }

        let Some(reported_trait) = field(&record, Some(trait_idx)) else {
            stats.skipped += 1;
            continue;
        };

        let efo_trait = field(&record, efo_trait_idx).unwrap_or(reported_trait);

        let next_trait_id = trait_ids.len() as i64 + 1;
        let trait_id = *trait_ids.entry(reported_trait.to_owned())
            .or_insert_with(|| {
                pending.traits.push(Trait {
                    trait_id: next_trait_id,
                    efo_trait: efo_trait.to_owned(),
                    reported_trait: reported_trait.to_owned(),
                });
                next_trait_id
            });

        let study_id = field(&record, study_idx);
        let pubmed_id = field(&record, pubmed_idx).map(str::to_owned);
        let text = |idx: Option<usize>| field(&record, idx).map(str::to_owned);

        if let Some(study_id) = study_id {
            if studies_seen.insert(study_id.to_owned()) {
                pending.studies.push(Study {
                    study_id: study_id.to_owned(),
                    pubmed_id: pubmed_id.clone(),
                    first_author: text(first_author_idx),
                    publication_date: text(date_idx),
                    journal: text(journal_idx),
                    title: text(title_idx),
                    initial_sample_size: text(initial_sample_idx),
                    replication_sample_size: text(replication_sample_idx),
                });
            }
        }

        let p_value_text = text(p_value_idx);
        let p_value = parse_f64(p_value_text.as_deref());
        let position = parse_f64(field(&record, position_idx)).map(|pos| pos as i64);

        for symbol in symbols {
            let resolution = symbol_map.resolve(Some(&symbol), None);
            stats.matches.record(&resolution);

            pending.associations.push(GeneTraitAssociation {
                gene_id: resolution.gene_id(),
                gene_symbol: symbol,
                trait_id,
                reported_trait: reported_trait.to_owned(),
                efo_trait: efo_trait.to_owned(),
                p_value,
                p_value_text: p_value_text.clone(),
                risk_allele: text(risk_allele_idx),
                risk_allele_freq: parse_f64(field(&record, risk_freq_idx)),
                odds_ratio: parse_f64(field(&record, odds_ratio_idx)),
                ci_text: text(ci_idx),
                chromosome: text(chromosome_idx),
                position,
                snp_id: text(snp_idx),
                study_id: study_id.map(str::to_owned),
                pubmed_id: pubmed_id.clone(),
                sample_description: text(initial_sample_idx),
            });
            stats.inserted += 1;
        }

        if pending.associations.len() >= batch_size.max(1) {
            pending.write(conn)?;
        }
    }

    pending.write(conn)?;

    affected_genes.extend(associated_genes(conn)?);
    let affected_genes: Vec<GeneId> = affected_genes.into_iter().collect();

    bump_freshness(conn)?;

    stats.log();
    tracing::info!(traits = trait_ids.len(), studies = studies_seen.len(),
                   genes = affected_genes.len(), "trait import finished");

    Ok(TraitImport {
        stats,
        trait_count: trait_ids.len(),
        study_count: studies_seen.len(),
        affected_genes,
    })
}
