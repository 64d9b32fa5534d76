use std::path::Path;

use rusqlite::Connection;

use crate::constants::*;
use crate::data_types::{ClinicalGeneSummary, ClinicalVariant};
use crate::db::bump_freshness;
use crate::load::{field, open_tsv, parse_count, parse_i64, truncate_opt, Batch, LoadStats};
use crate::resolve::SymbolMap;

pub fn is_pathogenic(clinical_significance: &str) -> bool {
    PATHOGENIC_TERMS.iter().any(|term| clinical_significance.contains(term))
}

fn insert_summaries(conn: &mut Connection, summaries: &[ClinicalGeneSummary]) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare_cached("
            INSERT INTO clinvar_gene_summary
              (gene_id, gene_symbol, total_submissions, total_alleles,
               pathogenic_alleles, uncertain_alleles, conflicting_alleles, gene_mim_number)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)")?;
        for summary in summaries {
            stmt.execute((summary.gene_id, &summary.gene_symbol, summary.total_submissions,
                          summary.total_alleles, summary.pathogenic_alleles,
                          summary.uncertain_alleles, summary.conflicting_alleles,
                          &summary.gene_mim_number))?;
        }
    }
    tx.commit()
}

/// Load the per-gene clinical summary (allele counts by significance).
pub fn load_clinical_gene_summary(conn: &mut Connection, path: &Path, symbol_map: &SymbolMap,
                                  batch_size: usize)
                                  -> anyhow::Result<LoadStats>
{
    let (columns, mut reader) = open_tsv(path)?;

    let symbol_idx = columns.require(&["Symbol", "GeneSymbol"])?;
    let gene_id_idx = columns.find(&["GeneID"]);
    let total_submissions_idx = columns.find(&["Total_submissions"]);
    let total_alleles_idx = columns.find(&["Total_alleles"]);
    let pathogenic_idx = columns.find(&["Alleles_reported_Pathogenic_Likely_pathogenic"]);
    let uncertain_idx = columns.find(&["Number_uncertain", "Number_Uncertain"]);
    let conflicts_idx = columns.find(&["Number_with_conflicts"]);
    let mim_idx = columns.find(&["Gene_MIM_number", "Gene_MIM_Number"]);

    conn.execute("DELETE FROM clinvar_gene_summary", ())?;

    let mut stats = LoadStats::new("clinvar_gene_summary");
    let mut batch = Batch::new(batch_size);

    for result in reader.records() {
        stats.rows_read += 1;

        let Ok(record) = result else {
            stats.skipped += 1;
            continue;
        };

        if record.len() < columns.column_count() {
            stats.skipped += 1;
            continue;
        }

        let Some(symbol) = field(&record, Some(symbol_idx)) else {
            stats.skipped += 1;
            continue;
        };

        let resolution = symbol_map.resolve(Some(symbol), field(&record, gene_id_idx));
        stats.matches.record(&resolution);

        let summary = ClinicalGeneSummary {
            gene_id: resolution.gene_id(),
            gene_symbol: symbol.to_owned(),
            total_submissions: parse_count(field(&record, total_submissions_idx)),
            total_alleles: parse_count(field(&record, total_alleles_idx)),
            pathogenic_alleles: parse_count(field(&record, pathogenic_idx)),
            uncertain_alleles: parse_count(field(&record, uncertain_idx)),
            conflicting_alleles: parse_count(field(&record, conflicts_idx)),
            gene_mim_number: field(&record, mim_idx).map(str::to_owned),
        };

        stats.inserted += 1;

        if let Some(rows) = batch.push(summary) {
            insert_summaries(conn, &rows)?;
        }
    }

    insert_summaries(conn, &batch.finish())?;
    bump_freshness(conn)?;

    stats.log();

    Ok(stats)
}

fn insert_variants(conn: &mut Connection, variants: &[ClinicalVariant]) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare_cached("
            INSERT INTO clinvar_variants
              (allele_id, variation_id, gene_id, gene_symbol, variant_name,
               variant_type, clinical_significance, review_status, phenotype_list,
               chromosome, start_pos, stop_pos, reference_allele, alternate_allele,
               rs_id, last_evaluated, origin, assembly)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)")?;
        for v in variants {
            stmt.execute(rusqlite::params![v.allele_id, v.variation_id, v.gene_id, v.gene_symbol,
                                           v.variant_name, v.variant_type, v.clinical_significance,
                                           v.review_status, v.phenotype_list, v.chromosome,
                                           v.start_pos, v.stop_pos, v.reference_allele,
                                           v.alternate_allele, v.rs_id, v.last_evaluated,
                                           v.origin, v.assembly])?;
        }
    }
    tx.commit()
}

fn allele(value: Option<&str>) -> Option<String> {
    truncate_opt(value.filter(|v| !v.eq_ignore_ascii_case("na")), MAX_ALLELE_LENGTH)
}

fn positive(value: Option<&str>) -> Option<i64> {
    parse_i64(value).filter(|v| *v > 0)
}

/// Load pathogenic and likely pathogenic variants.  Other significance
/// classes are counted as filtered.
pub fn load_clinical_variants(conn: &mut Connection, path: &Path, symbol_map: &SymbolMap,
                              batch_size: usize)
                              -> anyhow::Result<LoadStats>
{
    let (columns, mut reader) = open_tsv(path)?;

    let allele_id_idx = columns.require(&["AlleleID"])?;
    let significance_idx = columns.require(&["ClinicalSignificance"])?;
    let type_idx = columns.find(&["Type"]);
    let name_idx = columns.find(&["Name"]);
    let gene_id_idx = columns.find(&["GeneID"]);
    let symbol_idx = columns.find(&["GeneSymbol", "Symbol"]);
    let review_status_idx = columns.find(&["ReviewStatus"]);
    let phenotype_idx = columns.find(&["PhenotypeList"]);
    let chromosome_idx = columns.find(&["Chromosome"]);
    let start_idx = columns.find(&["Start"]);
    let stop_idx = columns.find(&["Stop"]);
    let ref_idx = columns.find(&["ReferenceAllele", "ReferenceAlleleVCF"]);
    let alt_idx = columns.find(&["AlternateAllele", "AlternateAlleleVCF"]);
    let rs_idx = columns.find(&["RS# (dbSNP)", "RS#(dbSNP)"]);
    let last_evaluated_idx = columns.find(&["LastEvaluated"]);
    let origin_idx = columns.find(&["Origin", "OriginSimple"]);
    let assembly_idx = columns.find(&["Assembly"]);
    let variation_id_idx = columns.find(&["VariationID"]);

    conn.execute("DELETE FROM clinvar_variants", ())?;

    let mut stats = LoadStats::new("clinvar_variants");
    let mut batch = Batch::new(batch_size);

    for result in reader.records() {
        stats.rows_read += 1;

        let Ok(record) = result else {
            stats.skipped += 1;
            continue;
        };

        if record.len() < CLINICAL_VARIANT_MIN_FIELDS {
            stats.skipped += 1;
            continue;
        }

        let Some(significance) = field(&record, Some(significance_idx)) else {
            stats.filtered += 1;
            continue;
        };

        if !is_pathogenic(significance) {
            stats.filtered += 1;
            continue;
        }

        let Some(allele_id) = parse_i64(field(&record, Some(allele_id_idx))) else {
            stats.skipped += 1;
            continue;
        };

        let symbol = field(&record, symbol_idx);
        let resolution = symbol_map.resolve(symbol, field(&record, gene_id_idx));
        stats.matches.record(&resolution);

        let variant = ClinicalVariant {
            allele_id,
            variation_id: parse_i64(field(&record, variation_id_idx)),
            gene_id: resolution.gene_id(),
            gene_symbol: symbol.map(str::to_owned),
            variant_name: truncate_opt(field(&record, name_idx), MAX_VARIANT_NAME_LENGTH),
            variant_type: field(&record, type_idx).map(str::to_owned),
            clinical_significance: truncate_opt(Some(significance), MAX_CLINICAL_SIGNIFICANCE_LENGTH),
            review_status: truncate_opt(field(&record, review_status_idx), MAX_REVIEW_STATUS_LENGTH),
            phenotype_list: truncate_opt(field(&record, phenotype_idx), MAX_PHENOTYPE_LIST_LENGTH),
            chromosome: field(&record, chromosome_idx)
                .filter(|chromosome| *chromosome != "-1" && *chromosome != "na")
                .map(str::to_owned),
            start_pos: positive(field(&record, start_idx)),
            stop_pos: positive(field(&record, stop_idx)),
            reference_allele: allele(field(&record, ref_idx)),
            alternate_allele: allele(field(&record, alt_idx)),
            rs_id: positive(field(&record, rs_idx)),
            last_evaluated: field(&record, last_evaluated_idx).map(str::to_owned),
            origin: field(&record, origin_idx).map(str::to_owned),
            assembly: field(&record, assembly_idx).map(str::to_owned),
        };

        stats.inserted += 1;

        if let Some(rows) = batch.push(variant) {
            insert_variants(conn, &rows)?;
        }
    }

    insert_variants(conn, &batch.finish())?;
    bump_freshness(conn)?;

    stats.log();

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pathogenic_classes() {
        assert!(is_pathogenic("Pathogenic"));
        assert!(is_pathogenic("Likely pathogenic"));
        assert!(is_pathogenic("Pathogenic/Likely pathogenic"));
        assert!(is_pathogenic("Pathogenic, low penetrance"));
        assert!(!is_pathogenic("Benign"));
        assert!(!is_pathogenic("Uncertain significance"));
        assert!(!is_pathogenic("Conflicting classifications of pathogenicity"));
    }

    #[test]
    fn allele_placeholders() {
        assert_eq!(allele(Some("na")), None);
        assert_eq!(allele(Some("A")), Some("A".to_owned()));
        assert_eq!(allele(None), None);
        assert_eq!(positive(Some("-1")), None);
        assert_eq!(positive(Some("43044295")), Some(43044295));
    }
}
