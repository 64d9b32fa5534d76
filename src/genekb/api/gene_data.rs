use rusqlite::{Connection, OptionalExtension};

use crate::api::search::flex;
use crate::api::search_utils::escape_like;
use crate::constants::*;
use crate::data_types::*;
use crate::types::{GeneId, GeneSymbol, TaxonId};

lazy_static! {
    static ref RELEASE_ORDER_SQL: String = order_case("gnomad_version", &CONSTRAINT_RELEASE_PRECEDENCE);
    static ref REVIEW_ORDER_SQL: String = order_case("review_status", &REVIEW_STATUS_TIERS);
}

// CASE expression ranking `column` by its position in `values`, unlisted
// values last
fn order_case(column: &str, values: &[&str]) -> String {
    let whens: Vec<String> = values.iter().enumerate()
        .map(|(idx, value)| format!("WHEN '{}' THEN {}", value.replace('\'', "''"), idx))
        .collect();
    format!("CASE {} {} ELSE {} END", column, whens.join(" "), values.len())
}

fn synonyms_of(conn: &Connection, gene_id: GeneId) -> rusqlite::Result<Vec<GeneSymbol>> {
    let mut stmt = conn.prepare("SELECT synonym FROM gene_synonyms WHERE gene_id = ?1 ORDER BY id")?;
    let synonyms = stmt.query_map([gene_id], |row| Ok(GeneSymbol::from(row.get::<_, String>(0)?)))?
        .collect::<rusqlite::Result<Vec<GeneSymbol>>>()?;
    Ok(synonyms)
}

fn functional_summary_of(conn: &Connection, gene_id: GeneId)
                         -> rusqlite::Result<Option<FunctionalSummaryDetails>>
{
    conn.query_row("SELECT summary, source FROM gene_summaries WHERE gene_id = ?1",
                   [gene_id],
                   |row| Ok(FunctionalSummaryDetails {
                       text: row.get::<_, String>(0)?.into(),
                       source: flex(row, 1)?,
                   }))
        .optional()
}

fn traits_of(conn: &Connection, gene_id: GeneId)
             -> rusqlite::Result<(Vec<TraitAssociationDetails>, i64)>
{
    let mut stmt = conn.prepare("
        SELECT reported_trait, p_value, snp_id, risk_allele, odds_ratio, pubmed_id
        FROM gene_traits
        WHERE gene_id = ?1
        ORDER BY p_value IS NULL, p_value, id
        LIMIT ?2")?;
    let traits = stmt.query_map((gene_id, DETAIL_TRAIT_LIMIT as i64), |row| {
        Ok(TraitAssociationDetails {
            reported_trait: row.get::<_, Option<String>>(0)?.unwrap_or_default().into(),
            p_value: row.get(1)?,
            snp_id: flex(row, 2)?,
            risk_allele: flex(row, 3)?,
            odds_ratio: row.get(4)?,
            pubmed_id: flex(row, 5)?,
        })
    })?.collect::<rusqlite::Result<Vec<_>>>()?;

    let trait_count = conn.query_row("SELECT COUNT(*) FROM gene_traits WHERE gene_id = ?1",
                                     [gene_id], |row| row.get(0))?;

    Ok((traits, trait_count))
}

fn constraint_of(conn: &Connection, gene_id: GeneId) -> rusqlite::Result<Option<ConstraintDetails>> {
    let sql = format!("SELECT pli, loeuf, oe_lof, oe_mis, mis_z, gnomad_version
                       FROM gene_constraints
                       WHERE gene_id = ?1
                       ORDER BY {}, id
                       LIMIT 1", *RELEASE_ORDER_SQL);
    conn.query_row(&sql, [gene_id], |row| {
        Ok(ConstraintDetails {
            pli: row.get(0)?,
            loeuf: row.get(1)?,
            oe_lof: row.get(2)?,
            oe_mis: row.get(3)?,
            mis_z: row.get(4)?,
            gnomad_version: row.get::<_, Option<String>>(5)?.unwrap_or_default().into(),
        })
    }).optional()
}

fn clinical_summary_of(conn: &Connection, gene_id: GeneId)
                       -> rusqlite::Result<Option<ClinicalSummaryDetails>>
{
    conn.query_row("SELECT pathogenic_alleles, uncertain_alleles, conflicting_alleles,
                           total_alleles, gene_mim_number
                    FROM clinvar_gene_summary
                    WHERE gene_id = ?1
                    ORDER BY id
                    LIMIT 1",
                   [gene_id],
                   |row| Ok(ClinicalSummaryDetails {
                       pathogenic_alleles: row.get::<_, Option<i64>>(0)?.unwrap_or(0),
                       uncertain_alleles: row.get::<_, Option<i64>>(1)?.unwrap_or(0),
                       conflicting_alleles: row.get::<_, Option<i64>>(2)?.unwrap_or(0),
                       total_alleles: row.get::<_, Option<i64>>(3)?.unwrap_or(0),
                       gene_mim_number: flex(row, 4)?,
                   }))
        .optional()
}

fn clinical_variants_of(conn: &Connection, gene_id: GeneId)
                        -> rusqlite::Result<Vec<ClinicalVariantDetails>>
{
    let sql = format!("SELECT allele_id, variant_name, variant_type, clinical_significance,
                              review_status, phenotype_list, chromosome, start_pos, rs_id
                       FROM clinvar_variants
                       WHERE gene_id = ?1
                       ORDER BY {}, clinical_significance, id
                       LIMIT ?2", *REVIEW_ORDER_SQL);
    let mut stmt = conn.prepare(&sql)?;
    let variants = stmt.query_map((gene_id, DETAIL_VARIANT_LIMIT as i64), |row| {
        Ok(ClinicalVariantDetails {
            allele_id: row.get(0)?,
            variant_name: flex(row, 1)?,
            variant_type: flex(row, 2)?,
            clinical_significance: flex(row, 3)?,
            review_status: flex(row, 4)?,
            phenotype_list: flex(row, 5)?,
            chromosome: flex(row, 6)?,
            start_pos: row.get(7)?,
            rs_id: row.get(8)?,
        })
    })?.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(variants)
}

fn ontology_terms_of(conn: &Connection, gene_id: GeneId) -> rusqlite::Result<OntologyTermsByCategory> {
    let mut stmt = conn.prepare("SELECT go_id, go_term, category FROM gene_go_terms
                                 WHERE gene_id = ?1
                                 ORDER BY category, go_term")?;
    let mut rows = stmt.query([gene_id])?;

    let mut terms = OntologyTermsByCategory::default();

    while let Some(row) = rows.next()? {
        let category: Option<String> = row.get(2)?;
        let Some(category) = category.and_then(|c| c.parse::<OntologyCategory>().ok()) else {
            continue;
        };
        terms.push(category, OntologyTermShort {
            go_id: row.get::<_, String>(0)?.into(),
            go_term: row.get::<_, String>(1)?.into(),
        });
    }

    Ok(terms)
}

/// The merged record of one gene, or None if the id isn't in the catalog.
pub fn gene_detail(conn: &Connection, gene_id: GeneId) -> rusqlite::Result<Option<GeneDetails>> {
    let gene = conn.query_row("
        SELECT g.gene_id, g.tax_id, g.symbol, g.name, g.chromosome, g.map_location,
               g.description, g.gene_type, s.common_name, s.name
        FROM genes g
        LEFT JOIN species s ON s.tax_id = g.tax_id
        WHERE g.gene_id = ?1",
        [gene_id],
        |row| Ok(GeneDetails {
            gene_id: row.get(0)?,
            tax_id: row.get(1)?,
            symbol: row.get::<_, String>(2)?.into(),
            name: flex(row, 3)?,
            chromosome: flex(row, 4)?,
            map_location: flex(row, 5)?,
            description: flex(row, 6)?,
            gene_type: flex(row, 7)?,
            species_name: flex(row, 8)?,
            species_scientific: flex(row, 9)?,
            synonyms: vec![],
            functional_summary: None,
            traits: vec![],
            trait_count: 0,
            constraint: None,
            clinvar_summary: None,
            clinvar_variants: vec![],
            go_terms: OntologyTermsByCategory::default(),
        }))
        .optional()?;

    let Some(mut gene) = gene else {
        return Ok(None);
    };

    let (traits, trait_count) = traits_of(conn, gene_id)?;

    gene.synonyms = synonyms_of(conn, gene_id)?;
    gene.functional_summary = functional_summary_of(conn, gene_id)?;
    gene.traits = traits;
    gene.trait_count = trait_count;
    gene.constraint = constraint_of(conn, gene_id)?;
    gene.clinvar_summary = clinical_summary_of(conn, gene_id)?;
    gene.clinvar_variants = clinical_variants_of(conn, gene_id)?;
    gene.go_terms = ontology_terms_of(conn, gene_id)?;

    Ok(Some(gene))
}

/// Species with at least one gene, largest first.
pub fn list_species(conn: &Connection) -> rusqlite::Result<Vec<Species>> {
    let mut stmt = conn.prepare("SELECT tax_id, name, common_name, gene_count
                                 FROM species
                                 WHERE gene_count > 0
                                 ORDER BY gene_count DESC, tax_id")?;
    let species = stmt.query_map((), |row| {
        Ok(Species {
            tax_id: row.get(0)?,
            name: row.get(1)?,
            common_name: row.get(2)?,
            gene_count: row.get::<_, i64>(3)? as usize,
        })
    })?.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(species)
}

/// Gene counts per chromosome: numbered chromosomes in numeric order, then
/// X, Y, MT and anything else.
pub fn list_chromosomes(conn: &Connection, tax_id: TaxonId)
                        -> rusqlite::Result<Vec<ChromosomeGeneCount>>
{
    let mut stmt = conn.prepare("
        SELECT chromosome, COUNT(*) AS gene_count
        FROM genes
        WHERE tax_id = ?1 AND chromosome IS NOT NULL AND chromosome != ''
        GROUP BY chromosome
        ORDER BY
          CASE
            WHEN chromosome GLOB '[0-9]*' THEN 0
            WHEN chromosome = 'X' THEN 1
            WHEN chromosome = 'Y' THEN 2
            WHEN chromosome = 'MT' THEN 3
            ELSE 4
          END,
          CASE WHEN chromosome GLOB '[0-9]*' THEN CAST(chromosome AS INTEGER) END,
          chromosome")?;
    let chromosomes = stmt.query_map([tax_id], |row| {
        Ok(ChromosomeGeneCount {
            chromosome: row.get::<_, String>(0)?.into(),
            gene_count: row.get::<_, i64>(1)? as usize,
        })
    })?.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(chromosomes)
}

fn chromosome_gene_from_row(row: &rusqlite::Row) -> rusqlite::Result<ChromosomeGene> {
    Ok(ChromosomeGene {
        gene_id: row.get(0)?,
        symbol: row.get::<_, String>(1)?.into(),
        name: flex(row, 2)?,
        map_location: flex(row, 3)?,
        description: flex(row, 4)?,
        gene_type: flex(row, 5)?,
    })
}

pub fn chromosome_genes(conn: &Connection, chromosome: &str, tax_id: TaxonId)
                        -> rusqlite::Result<Vec<ChromosomeGene>>
{
    let mut stmt = conn.prepare("
        SELECT gene_id, symbol, name, map_location, description, gene_type
        FROM genes
        WHERE chromosome = ?1 AND tax_id = ?2
        ORDER BY map_location, gene_id")?;
    let genes = stmt.query_map((chromosome, tax_id), chromosome_gene_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(genes)
}

/// Genes whose map location starts with the chromosome name followed by
/// `region`, e.g. "17" + "q21".  An empty region matches the whole
/// chromosome.
pub fn chromosome_region(conn: &Connection, chromosome: &str, tax_id: TaxonId, region: &str)
                         -> rusqlite::Result<Vec<ChromosomeGene>>
{
    let pattern = format!("{}{}%", escape_like(chromosome), escape_like(region.trim()));

    let mut stmt = conn.prepare("
        SELECT gene_id, symbol, name, map_location, description, gene_type
        FROM genes
        WHERE chromosome = ?1 AND tax_id = ?2
          AND (?3 = '' OR map_location LIKE ?4 ESCAPE '!')
        ORDER BY map_location, gene_id
        LIMIT ?5")?;
    let genes = stmt.query_map((chromosome, tax_id, region.trim(), &pattern,
                                CHROMOSOME_REGION_LIMIT as i64),
                               chromosome_gene_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(genes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_order() {
        assert_eq!(order_case("c", &["a", "it's"]),
                   "CASE c WHEN 'a' THEN 0 WHEN 'it''s' THEN 1 ELSE 2 END");
    }
}
