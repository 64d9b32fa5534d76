use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rusqlite::Connection;

use crate::constants::CORPUS_BATCH_SIZE;
use crate::corpus::CorpusBuilder;
use crate::db::{self, integrity_report, IntegrityReport};
use crate::load::clinical::{load_clinical_gene_summary, load_clinical_variants};
use crate::load::constraint::{load_constraints, RELEASE_V2_1_1, RELEASE_V4_1};
use crate::load::gene_info::load_gene_catalog;
use crate::load::gene_ontology::load_gene_ontology;
use crate::load::gene_summaries::load_gene_summaries;
use crate::load::gwas::load_trait_associations;
use crate::resolve::SymbolMap;
use crate::web::config::Config;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildAction {
    Build,
    ImportClinical,
    ImportConstraint,
    ImportTraits,
    ImportSummaries,
    RebuildCorpus,
    All,
    Check,
}

impl BuildAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildAction::Build => "build",
            BuildAction::ImportClinical => "import-clinical",
            BuildAction::ImportConstraint => "import-constraint",
            BuildAction::ImportTraits => "import-traits",
            BuildAction::ImportSummaries => "import-summaries",
            BuildAction::RebuildCorpus => "rebuild-corpus",
            BuildAction::All => "all",
            BuildAction::Check => "check",
        }
    }
}

impl FromStr for BuildAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "build" => Ok(BuildAction::Build),
            "import-clinical" => Ok(BuildAction::ImportClinical),
            "import-constraint" => Ok(BuildAction::ImportConstraint),
            "import-traits" => Ok(BuildAction::ImportTraits),
            "import-summaries" => Ok(BuildAction::ImportSummaries),
            "rebuild-corpus" => Ok(BuildAction::RebuildCorpus),
            "all" => Ok(BuildAction::All),
            "check" => Ok(BuildAction::Check),
            _ => Err(format!("unknown action: {}", s)),
        }
    }
}

impl fmt::Display for BuildAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// whether a missing source file is an error or is skipped
#[derive(Clone, Copy, PartialEq, Eq)]
enum Source {
    Required,
    Optional,
}

/// Runs the batch build steps against one database file.  The build is a
/// single writer: nothing else should write to the database meanwhile.
pub struct DatabaseBuilder<'a> {
    config: &'a Config,
    db_path: PathBuf,
    data_dir: PathBuf,
}

impl<'a> DatabaseBuilder<'a> {
    pub fn new(config: &'a Config, db_path: &Path, data_dir: &Path) -> DatabaseBuilder<'a> {
        DatabaseBuilder {
            config,
            db_path: db_path.to_owned(),
            data_dir: data_dir.to_owned(),
        }
    }

    fn open(&self) -> anyhow::Result<Connection> {
        Ok(db::open(&self.db_path)?)
    }

    fn source_path(&self, file_name: &str, source: Source) -> anyhow::Result<Option<PathBuf>> {
        let path = self.data_dir.join(file_name);
        if path.exists() {
            return Ok(Some(path));
        }
        if source == Source::Required {
            anyhow::bail!("source file not found: {}", path.display());
        }
        tracing::warn!(path = %path.display(), "source file not found, skipping");
        Ok(None)
    }

    fn symbol_map(&self, conn: &Connection) -> anyhow::Result<SymbolMap> {
        Ok(SymbolMap::load(conn, self.config.resolver_taxonid)?)
    }

    fn corpus_builder(&self) -> CorpusBuilder {
        CorpusBuilder::new(CORPUS_BATCH_SIZE)
    }

    /// Recreate the database from the gene catalog and ontology files and
    /// index every gene.
    pub fn build(&self) -> anyhow::Result<IntegrityReport> {
        let batch_size = self.config.load_batch_size;
        let files = &self.config.data_files;

        let gene_info_path = self.source_path(&files.gene_info, Source::Required)?;
        let gene_ontology_path = self.source_path(&files.gene_ontology, Source::Optional)?;

        let mut conn = db::reset_database(&self.db_path)?;

        if let Some(path) = gene_info_path {
            load_gene_catalog(&mut conn, &path, &self.config.species, batch_size)?;
        }
        if let Some(path) = gene_ontology_path {
            load_gene_ontology(&mut conn, &path, batch_size)?;
        }

        self.corpus_builder().rebuild_all(&mut conn)?;

        self.check_connection(&conn)
    }

    fn import_clinical_from(&self, source: Source) -> anyhow::Result<()> {
        let batch_size = self.config.load_batch_size;
        let files = &self.config.data_files;

        let summary_path = self.source_path(&files.clinical_gene_summary, source)?;
        let variants_path = self.source_path(&files.clinical_variants, source)?;

        let mut conn = self.open()?;
        let symbol_map = self.symbol_map(&conn)?;

        if let Some(path) = summary_path {
            load_clinical_gene_summary(&mut conn, &path, &symbol_map, batch_size)?;
        }
        if let Some(path) = variants_path {
            load_clinical_variants(&mut conn, &path, &symbol_map, batch_size)?;
        }

        Ok(())
    }

    pub fn import_clinical(&self) -> anyhow::Result<()> {
        self.import_clinical_from(Source::Required)
    }

    // each release is imported if its file is present
    fn import_constraint_from(&self, source: Source) -> anyhow::Result<()> {
        let batch_size = self.config.load_batch_size;
        let files = &self.config.data_files;

        let releases = [(&RELEASE_V4_1, &files.constraint_v4_1),
                        (&RELEASE_V2_1_1, &files.constraint_v2_1_1)];

        let mut conn = self.open()?;
        let symbol_map = self.symbol_map(&conn)?;

        let mut imported = 0;

        for (release, file_name) in releases {
            if let Some(path) = self.source_path(file_name, Source::Optional)? {
                load_constraints(&mut conn, &path, release, &symbol_map, batch_size)?;
                imported += 1;
            }
        }

        if imported == 0 && source == Source::Required {
            anyhow::bail!("no constraint files found in {}", self.data_dir.display());
        }

        Ok(())
    }

    pub fn import_constraint(&self) -> anyhow::Result<()> {
        self.import_constraint_from(Source::Required)
    }

    // replaces the trait tables and then refreshes the documents of every
    // gene that had or now has a matched association
    fn import_traits_from(&self, source: Source) -> anyhow::Result<()> {
        let Some(path) = self.source_path(&self.config.data_files.trait_associations, source)? else {
            return Ok(());
        };

        let mut conn = self.open()?;
        let symbol_map = self.symbol_map(&conn)?;

        let trait_import = load_trait_associations(&mut conn, &path, &symbol_map,
                                                   self.config.load_batch_size)?;

        self.corpus_builder().replace_documents(&mut conn, &trait_import.affected_genes)?;

        Ok(())
    }

    pub fn import_traits(&self) -> anyhow::Result<()> {
        self.import_traits_from(Source::Required)
    }

    fn import_summaries_from(&self, source: Source) -> anyhow::Result<()> {
        let Some(path) = self.source_path(&self.config.data_files.gene_summaries, source)? else {
            return Ok(());
        };

        let mut conn = self.open()?;
        load_gene_summaries(&mut conn, &path, self.config.load_batch_size)?;

        Ok(())
    }

    pub fn import_summaries(&self) -> anyhow::Result<()> {
        self.import_summaries_from(Source::Required)
    }

    pub fn rebuild_corpus(&self) -> anyhow::Result<usize> {
        let mut conn = self.open()?;
        self.corpus_builder().rebuild_all(&mut conn)
    }

    /// The full build followed by every optional import.  Missing optional
    /// source files are skipped.
    pub fn all(&self) -> anyhow::Result<IntegrityReport> {
        self.build()?;
        self.import_clinical_from(Source::Optional)?;
        self.import_constraint_from(Source::Optional)?;
        self.import_traits_from(Source::Optional)?;
        self.import_summaries_from(Source::Optional)?;
        self.check()
    }

    fn check_connection(&self, conn: &Connection) -> anyhow::Result<IntegrityReport> {
        let report = integrity_report(conn)?;

        tracing::info!(genes = report.gene_count,
                       documents = ?report.document_count,
                       orphan_genes = report.orphan_genes,
                       species_count_mismatches = report.species_count_mismatches.len(),
                       "integrity report");

        for unmatched in &report.unmatched {
            tracing::info!(table = %unmatched.table_name, total = unmatched.total,
                           unmatched = unmatched.unmatched, ratio = unmatched.ratio,
                           "unmatched rows");
        }

        if !report.is_consistent() {
            tracing::warn!("database failed the integrity check");
        }

        Ok(report)
    }

    pub fn check(&self) -> anyhow::Result<IntegrityReport> {
        let conn = self.open()?;
        self.check_connection(&conn)
    }

    pub fn run(&self, action: BuildAction) -> anyhow::Result<()> {
        tracing::info!(action = %action, db = %self.db_path.display(), "starting");

        match action {
            BuildAction::Build => { self.build()?; },
            BuildAction::ImportClinical => self.import_clinical()?,
            BuildAction::ImportConstraint => self.import_constraint()?,
            BuildAction::ImportTraits => self.import_traits()?,
            BuildAction::ImportSummaries => self.import_summaries()?,
            BuildAction::RebuildCorpus => { self.rebuild_corpus()?; },
            BuildAction::All => { self.all()?; },
            BuildAction::Check => {
                let report = self.check()?;
                println!("{}", serde_json::to_string_pretty(&report)?);
            },
        }

        tracing::info!(action = %action, "done");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_names() {
        for name in ["build", "import-clinical", "import-constraint", "import-traits",
                     "import-summaries", "rebuild-corpus", "all", "check"] {
            let action: BuildAction = name.parse().unwrap();
            assert_eq!(action.to_string(), name);
        }
        assert!("rebuild".parse::<BuildAction>().is_err());
    }
}
