use std::collections::{HashMap, HashSet};
use std::path::Path;

use rusqlite::Connection;

use crate::constants::*;
use crate::data_types::{Gene, Synonym};
use crate::db::{bump_freshness, recompute_species_gene_counts};
use crate::load::{field, open_tsv, truncate_opt, Batch, LoadStats};
use crate::types::{GeneId, TaxonId};
use crate::web::config::SpeciesConfig;

struct GeneInfoColumns {
    tax_id: usize,
    gene_id: usize,
    symbol: usize,
    synonyms: Option<usize>,
    chromosome: Option<usize>,
    map_location: Option<usize>,
    description: Option<usize>,
    gene_type: Option<usize>,
    full_name: Option<usize>,
    other_designations: Option<usize>,
}

fn split_names(value: Option<&str>) -> impl Iterator<Item = &str> {
    value.into_iter()
        .flat_map(|value| value.split('|'))
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != "-")
}

fn insert_species(conn: &mut Connection, species: &[SpeciesConfig]) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare("INSERT OR REPLACE INTO species (tax_id, name, common_name, gene_count)
                                   VALUES (?1, ?2, ?3, 0)")?;
        for species_config in species {
            stmt.execute((species_config.tax_id, &species_config.name,
                          &species_config.common_name))?;
        }
    }
    tx.commit()
}

fn insert_genes(conn: &mut Connection, genes: &[(Gene, Vec<Synonym>)]) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    {
        let mut gene_stmt =
            tx.prepare_cached("INSERT INTO genes (gene_id, tax_id, symbol, name, chromosome,
                                                  map_location, description, gene_type)
                               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)")?;
        let mut synonym_stmt =
            tx.prepare_cached("INSERT INTO gene_synonyms (gene_id, synonym) VALUES (?1, ?2)")?;

        for (gene, synonyms) in genes {
            gene_stmt.execute((gene.gene_id, gene.tax_id, &gene.symbol, &gene.name,
                               &gene.chromosome, &gene.map_location, &gene.description,
                               &gene.gene_type))?;
            for synonym in synonyms {
                synonym_stmt.execute((synonym.gene_id, &synonym.synonym))?;
            }
        }
    }
    tx.commit()
}

/// Load the core gene catalog, replacing any existing catalog rows.  Only
/// genes of the allow-listed species are kept.
pub fn load_gene_catalog(conn: &mut Connection, path: &Path, species: &[SpeciesConfig],
                         batch_size: usize)
                         -> anyhow::Result<LoadStats>
{
    let (columns, mut reader) = open_tsv(path)?;

    let columns = GeneInfoColumns {
        tax_id: columns.require(&["tax_id"])?,
        gene_id: columns.require(&["GeneID", "gene_id"])?,
        symbol: columns.require(&["Symbol"])?,
        synonyms: columns.find(&["Synonyms"]),
        chromosome: columns.find(&["chromosome"]),
        map_location: columns.find(&["map_location"]),
        description: columns.find(&["description"]),
        gene_type: columns.find(&["type_of_gene"]),
        full_name: columns.find(&["Full_name_from_nomenclature_authority"]),
        other_designations: columns.find(&["Other_designations"]),
    };

    let allowed: HashSet<TaxonId> = species.iter().map(|s| s.tax_id).collect();

    conn.execute_batch("DELETE FROM gene_synonyms;
                        DELETE FROM gene_go_terms;
                        DELETE FROM genes;
                        DELETE FROM species;")?;

    insert_species(conn, species)?;

    let mut stats = LoadStats::new("gene_info");
    let mut seen_ids: HashSet<GeneId> = HashSet::new();
    let mut species_counts: HashMap<TaxonId, usize> = HashMap::new();
    let mut batch = Batch::new(batch_size);

    for result in reader.records() {
        stats.rows_read += 1;

        let record = match result {
            Ok(record) => record,
            Err(err) => {
                tracing::debug!("skipping unreadable gene_info row: {}", err);
                stats.skipped += 1;
                continue;
            }
        };

        if record.len() < GENE_INFO_MIN_FIELDS {
            stats.skipped += 1;
            continue;
        }

        let Some(tax_id) = field(&record, Some(columns.tax_id))
            .and_then(|v| v.parse::<TaxonId>().ok())
        else {
            stats.skipped += 1;
            continue;
        };

        if !allowed.contains(&tax_id) {
            stats.filtered += 1;
            continue;
        }

        let gene_id = field(&record, Some(columns.gene_id))
            .and_then(|v| v.parse::<GeneId>().ok());
        let symbol = field(&record, Some(columns.symbol));

        let (Some(gene_id), Some(symbol)) = (gene_id, symbol) else {
            stats.skipped += 1;
            continue;
        };

        if !seen_ids.insert(gene_id) {
            stats.duplicates += 1;
            continue;
        }

        let description = truncate_opt(field(&record, columns.description),
                                       MAX_GENE_DESCRIPTION_LENGTH);
        let name = truncate_opt(field(&record, columns.full_name), MAX_GENE_NAME_LENGTH)
            .or_else(|| truncate_opt(description.as_deref(), MAX_GENE_NAME_LENGTH));

        let gene = Gene {
            gene_id,
            tax_id,
            symbol: symbol.to_owned(),
            name,
            chromosome: field(&record, columns.chromosome).map(str::to_owned),
            map_location: field(&record, columns.map_location).map(str::to_owned),
            description,
            gene_type: field(&record, columns.gene_type).map(str::to_owned),
        };

        let synonyms = split_names(field(&record, columns.synonyms))
            .chain(split_names(field(&record, columns.other_designations)))
            .map(|synonym| Synonym {
                gene_id,
                synonym: synonym.to_owned(),
            })
            .collect();

        *species_counts.entry(tax_id).or_default() += 1;
        stats.inserted += 1;

        if let Some(rows) = batch.push((gene, synonyms)) {
            insert_genes(conn, &rows)?;
        }
    }

    insert_genes(conn, &batch.finish())?;

    let tx = conn.transaction()?;
    recompute_species_gene_counts(&tx)?;
    bump_freshness(&tx)?;
    tx.commit()?;

    for species_config in species {
        let count = species_counts.get(&species_config.tax_id).copied().unwrap_or(0);
        tracing::info!(tax_id = species_config.tax_id, species = %species_config.name,
                       genes = count, "loaded genes");
    }

    stats.log();

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_split() {
        let names: Vec<_> = split_names(Some("BRCAI|BRCC1| |-|IRIS")).collect();
        assert_eq!(names, vec!["BRCAI", "BRCC1", "IRIS"]);
        assert_eq!(split_names(None).count(), 0);
    }
}
