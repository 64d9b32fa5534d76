use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use rusqlite::Connection;
use tempfile::TempDir;

use genekb::api::cache::{CacheBackend, LocalCache};
use genekb::api::query_exec::QueryExec;
use genekb::build::DatabaseBuilder;
use genekb::web::config::Config;

pub const BRCA1: i64 = 672;
pub const BRCA2: i64 = 675;
pub const TP53: i64 = 7157;
pub const BRCA1P1: i64 = 394269;
pub const LINC00001: i64 = 100506380;
pub const MOUSE_BRCA1: i64 = 12189;
// a yeast gene under a tax id that isn't in the species allow-list
pub const YEAST_CDC28: i64 = 852457;

const GENE_INFO_HEADER: [&str; 16] =
    ["#tax_id", "GeneID", "Symbol", "LocusTag", "Synonyms", "dbXrefs", "chromosome",
     "map_location", "description", "type_of_gene", "Symbol_from_nomenclature_authority",
     "Full_name_from_nomenclature_authority", "Nomenclature_status", "Other_designations",
     "Modification_date", "Feature_type"];

const GENE2GO_HEADER: [&str; 8] =
    ["#tax_id", "GeneID", "GO_ID", "Evidence", "Qualifier", "GO_term", "PubMed", "Category"];

const CLINICAL_SUMMARY_HEADER: [&str; 10] =
    ["Symbol", "GeneID", "Total_submissions", "Total_alleles", "Submitted_germline",
     "Reported_somatic", "Alleles_reported_Pathogenic_Likely_pathogenic", "Gene_MIM_number",
     "Number_uncertain", "Number_with_conflicts"];

const VARIANT_HEADER: [&str; 26] =
    ["#AlleleID", "Type", "Name", "GeneID", "GeneSymbol", "HGNC_ID", "ClinicalSignificance",
     "ClinSigSimple", "LastEvaluated", "RS# (dbSNP)", "nsv/esv (dbVar)", "RCVaccession",
     "PhenotypeIDS", "PhenotypeList", "Origin", "OriginSimple", "Assembly",
     "ChromosomeAccession", "Chromosome", "Start", "Stop", "ReferenceAllele",
     "AlternateAllele", "Cytogenetic", "ReviewStatus", "VariationID"];

const CONSTRAINT_V4_1_HEADER: [&str; 8] =
    ["gene", "transcript", "lof.pLI", "lof.oe", "lof.oe_ci.lower", "lof.oe_ci.upper",
     "mis.oe", "mis.z_score"];

const CONSTRAINT_V2_1_1_HEADER: [&str; 7] =
    ["gene", "transcript", "pLI", "oe_lof", "oe_lof_lower", "oe_lof_upper", "mis_z"];

const GWAS_HEADER: [&str; 17] =
    ["PUBMEDID", "FIRST AUTHOR", "DATE", "JOURNAL", "STUDY", "DISEASE/TRAIT",
     "INITIAL SAMPLE SIZE", "CHR_ID", "CHR_POS", "REPORTED GENE(S)", "MAPPED_GENE",
     "STRONGEST SNP-RISK ALLELE", "SNPS", "P-VALUE", "OR or BETA", "MAPPED_TRAIT",
     "STUDY ACCESSION"];

const GENE_SUMMARY_HEADER: [&str; 4] = ["#tax_id", "GeneID", "Source", "Summary"];

// one tab separated table, columns missing from a row are written as "-"
fn table(header: &[&str], rows: &[Vec<(&str, &str)>]) -> String {
    let mut out = header.join("\t");
    out.push('\n');

    for row in rows {
        let fields: Vec<&str> = header.iter()
            .map(|column| {
                row.iter()
                    .find(|(name, _)| name == column)
                    .map(|(_, value)| *value)
                    .unwrap_or("-")
            })
            .collect();
        out.push_str(&fields.join("\t"));
        out.push('\n');
    }

    out
}

fn write_source(data_dir: &Path, file_name: &str, contents: &str) {
    let path = data_dir.join(file_name);
    let mut file = File::create(&path).unwrap();

    if file_name.ends_with(".gz") {
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(contents.as_bytes()).unwrap();
        encoder.finish().unwrap();
    } else {
        file.write_all(contents.as_bytes()).unwrap();
    }
}

fn gene_info() -> String {
    table(&GENE_INFO_HEADER, &[
        vec![("#tax_id", "9606"), ("GeneID", "672"), ("Symbol", "BRCA1"),
             ("Synonyms", "BRCAI|BRCC1|FANCS"), ("chromosome", "17"), ("map_location", "17q21.31"),
             ("description", "BRCA1 tumor suppressor gene, DNA repair associated"),
             ("type_of_gene", "protein-coding"),
             ("Full_name_from_nomenclature_authority", "BRCA1 DNA repair associated"),
             ("Other_designations", "breast cancer type 1 susceptibility protein")],
        vec![("#tax_id", "9606"), ("GeneID", "675"), ("Symbol", "BRCA2"),
             ("Synonyms", "FANCD1"), ("chromosome", "13"), ("map_location", "13q13.1"),
             ("description", "BRCA2 DNA repair associated"), ("type_of_gene", "protein-coding"),
             ("Full_name_from_nomenclature_authority", "BRCA2 DNA repair associated")],
        vec![("#tax_id", "9606"), ("GeneID", "7157"), ("Symbol", "TP53"),
             ("Synonyms", "LFS1"), ("chromosome", "17"), ("map_location", "17p13.1"),
             ("description", "tumor protein p53"), ("type_of_gene", "protein-coding"),
             ("Full_name_from_nomenclature_authority", "tumor protein p53")],
        vec![("#tax_id", "9606"), ("GeneID", "394269"), ("Symbol", "BRCA1P1"),
             ("chromosome", "17"), ("map_location", "17q21.31"),
             ("description", "BRCA1 pseudogene 1"), ("type_of_gene", "pseudo")],
        vec![("#tax_id", "9606"), ("GeneID", "100506380"), ("Symbol", "LINC00001"),
             ("chromosome", "X"), ("map_location", "Xp22.33"),
             ("description", "long intergenic non-protein coding RNA 1"),
             ("type_of_gene", "ncRNA")],
        vec![("#tax_id", "10090"), ("GeneID", "12189"), ("Symbol", "Brca1"),
             ("chromosome", "11"), ("map_location", "11 E1"),
             ("description", "breast cancer 1, early onset"), ("type_of_gene", "protein-coding")],
        vec![("#tax_id", "4932"), ("GeneID", "852457"), ("Symbol", "CDC28"),
             ("chromosome", "II"), ("description", "cyclin-dependent serine/threonine-protein kinase"),
             ("type_of_gene", "protein-coding")],
        // duplicate id, dropped
        vec![("#tax_id", "9606"), ("GeneID", "7157"), ("Symbol", "TP53DUP"),
             ("chromosome", "17"), ("type_of_gene", "protein-coding")],
    ])
}

fn gene2go() -> String {
    table(&GENE2GO_HEADER, &[
        vec![("#tax_id", "9606"), ("GeneID", "672"), ("GO_ID", "GO:0006281"),
             ("Evidence", "IDA"), ("GO_term", "DNA repair"), ("Category", "Process")],
        vec![("#tax_id", "9606"), ("GeneID", "672"), ("GO_ID", "GO:0005634"),
             ("Evidence", "IDA"), ("GO_term", "nucleus"), ("Category", "Component")],
        vec![("#tax_id", "9606"), ("GeneID", "7157"), ("GO_ID", "GO:0003700"),
             ("Evidence", "IDA"), ("GO_term", "DNA-binding transcription factor activity"),
             ("Category", "Function")],
        // not in the catalog
        vec![("#tax_id", "4932"), ("GeneID", "852457"), ("GO_ID", "GO:0004693"),
             ("Evidence", "IDA"), ("GO_term", "cyclin-dependent protein kinase activity"),
             ("Category", "Function")],
    ])
}

fn clinical_summary() -> String {
    table(&CLINICAL_SUMMARY_HEADER, &[
        vec![("Symbol", "BRCA1"), ("GeneID", "672"), ("Total_submissions", "15000"),
             ("Total_alleles", "9000"), ("Alleles_reported_Pathogenic_Likely_pathogenic", "3100"),
             ("Gene_MIM_number", "113705"), ("Number_uncertain", "4000"),
             ("Number_with_conflicts", "300")],
        vec![("Symbol", "TP53"), ("GeneID", "7157"), ("Total_submissions", "5000"),
             ("Total_alleles", "3000"), ("Alleles_reported_Pathogenic_Likely_pathogenic", "400"),
             ("Gene_MIM_number", "191170"), ("Number_uncertain", "1200"),
             ("Number_with_conflicts", "90")],
        vec![("Symbol", "NOVEL1"), ("Total_submissions", "3"), ("Total_alleles", "2"),
             ("Alleles_reported_Pathogenic_Likely_pathogenic", "0"), ("Number_uncertain", "2"),
             ("Number_with_conflicts", "0")],
    ])
}

fn clinical_variants() -> String {
    table(&VARIANT_HEADER, &[
        vec![("#AlleleID", "15041"), ("Type", "Indel"), ("Name", "NM_007294.4(BRCA1):c.68_69del"),
             ("GeneID", "672"), ("GeneSymbol", "BRCA1"), ("ClinicalSignificance", "Pathogenic"),
             ("RS# (dbSNP)", "80357914"), ("PhenotypeList", "Hereditary breast ovarian cancer syndrome"),
             ("Origin", "germline"), ("Assembly", "GRCh38"), ("Chromosome", "17"),
             ("Start", "43124027"), ("Stop", "43124028"), ("ReviewStatus", "criteria provided, single submitter"),
             ("VariationID", "17662")],
        vec![("#AlleleID", "15042"), ("Type", "single nucleotide variant"),
             ("Name", "NM_007294.4(BRCA1):c.5266dup"), ("GeneID", "672"), ("GeneSymbol", "BRCA1"),
             ("ClinicalSignificance", "Pathogenic"), ("Assembly", "GRCh38"), ("Chromosome", "17"),
             ("Start", "43057062"), ("Stop", "43057063"), ("ReviewStatus", "reviewed by expert panel"),
             ("VariationID", "17677")],
        vec![("#AlleleID", "15043"), ("Type", "single nucleotide variant"),
             ("Name", "NM_007294.4(BRCA1):c.4837A>G"), ("GeneID", "672"), ("GeneSymbol", "BRCA1"),
             ("ClinicalSignificance", "Benign"), ("Assembly", "GRCh38"), ("Chromosome", "17"),
             ("Start", "43071077"), ("Stop", "43071077"), ("ReviewStatus", "reviewed by expert panel")],
        vec![("#AlleleID", "27400"), ("Type", "single nucleotide variant"),
             ("Name", "NM_000546.6(TP53):c.743G>A"), ("GeneID", "7157"), ("GeneSymbol", "TP53"),
             ("ClinicalSignificance", "Likely pathogenic"), ("Assembly", "GRCh38"),
             ("Chromosome", "17"), ("Start", "7674220"), ("Stop", "7674220"),
             ("ReviewStatus", "criteria provided, multiple submitters, no conflicts")],
    ])
}

fn constraint_v4_1() -> String {
    table(&CONSTRAINT_V4_1_HEADER, &[
        vec![("gene", "BRCA1"), ("transcript", "ENST00000357654"), ("lof.pLI", "0.95"),
             ("lof.oe", "0.2"), ("lof.oe_ci.lower", "0.12"), ("lof.oe_ci.upper", "0.3"),
             ("mis.oe", "0.9"), ("mis.z_score", "1.2")],
        vec![("gene", "BRCA2"), ("transcript", "ENST00000380152"), ("lof.pLI", "NA"),
             ("lof.oe", "0.7"), ("lof.oe_ci.upper", "0.9"), ("mis.oe", "1.0")],
        vec![("gene", "TP53"), ("transcript", "ENST00000269305"), ("lof.pLI", "0.2"),
             ("lof.oe", "0.5"), ("lof.oe_ci.upper", "0.8"), ("mis.oe", "0.6"),
             ("mis.z_score", "3.1")],
        vec![("gene", "NOTAGENE"), ("lof.pLI", "0.5"), ("lof.oe_ci.upper", "1.1")],
    ])
}

fn constraint_v2_1_1() -> String {
    table(&CONSTRAINT_V2_1_1_HEADER, &[
        vec![("gene", "BRCA2"), ("transcript", "ENST00000544455"), ("pLI", "0.97"),
             ("oe_lof", "0.3"), ("oe_lof_upper", "0.5")],
        vec![("gene", "TP53"), ("transcript", "ENST00000269305"), ("pLI", "0.99"),
             ("oe_lof", "0.1"), ("oe_lof_upper", "0.2")],
    ])
}

fn gwas_catalog_rows() -> Vec<Vec<(&'static str, &'static str)>> {
    vec![
        vec![("PUBMEDID", "17529967"), ("FIRST AUTHOR", "Easton DF"), ("DATE", "2007-05-27"),
             ("JOURNAL", "Nature"), ("STUDY", "Genome-wide association study of breast cancer"),
             ("DISEASE/TRAIT", "Breast cancer"), ("INITIAL SAMPLE SIZE", "4,398 cases"),
             ("CHR_ID", "17"), ("CHR_POS", "43044295"), ("REPORTED GENE(S)", "BRCA1, BRCA2"),
             ("STRONGEST SNP-RISK ALLELE", "rs799917-T"), ("SNPS", "rs799917"),
             ("P-VALUE", "1E-20"), ("OR or BETA", "1.26"), ("MAPPED_TRAIT", "breast carcinoma"),
             ("STUDY ACCESSION", "GCST000001")],
        vec![("PUBMEDID", "20000001"), ("FIRST AUTHOR", "Smith J"), ("DATE", "2010-01-01"),
             ("STUDY", "Cancer predisposition"), ("DISEASE/TRAIT", "Li-Fraumeni syndrome"),
             ("REPORTED GENE(S)", "TP53"), ("SNPS", "rs1042522"), ("P-VALUE", "2E-10"),
             ("STUDY ACCESSION", "GCST000002")],
        vec![("PUBMEDID", "20000001"), ("DISEASE/TRAIT", "Ovarian cancer"),
             ("REPORTED GENE(S)", "BRCA1"), ("P-VALUE", "3E-8"), ("STUDY ACCESSION", "GCST000002")],
        vec![("PUBMEDID", "20000002"), ("DISEASE/TRAIT", "Height"), ("REPORTED GENE(S)", "NR"),
             ("P-VALUE", "5E-9"), ("STUDY ACCESSION", "GCST000003")],
        vec![("PUBMEDID", "20000003"), ("DISEASE/TRAIT", "Prostate cancer"),
             ("REPORTED GENE(S)", "NOVELGENE"), ("P-VALUE", "4E-9"),
             ("STUDY ACCESSION", "GCST000004")],
    ]
}

fn gwas_catalog() -> String {
    table(&GWAS_HEADER, &gwas_catalog_rows())
}

fn gene_summaries() -> String {
    table(&GENE_SUMMARY_HEADER, &[
        vec![("#tax_id", "9606"), ("GeneID", "672"), ("Source", "RefSeq"),
             ("Summary", "This gene encodes a nuclear phosphoprotein that plays a role in \
                          maintaining genomic stability, and it also acts as a tumor suppressor.")],
        vec![("#tax_id", "9606"), ("GeneID", "7157"), ("Source", "RefSeq"),
             ("Summary", "Too short to keep.")],
    ])
}

/// A data directory with every source file, written under the default file
/// names, and a database path next to it.
pub struct TestKb {
    _dir: TempDir,
    pub config: Config,
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
}

#[allow(dead_code)]
impl TestKb {
    pub fn new() -> TestKb {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        std::fs::create_dir(&data_dir).unwrap();

        let config = Config::default();
        let files = &config.data_files;

        write_source(&data_dir, &files.gene_info, &gene_info());
        write_source(&data_dir, &files.gene_ontology, &gene2go());
        write_source(&data_dir, &files.clinical_gene_summary, &clinical_summary());
        write_source(&data_dir, &files.clinical_variants, &clinical_variants());
        write_source(&data_dir, &files.constraint_v4_1, &constraint_v4_1());
        write_source(&data_dir, &files.constraint_v2_1_1, &constraint_v2_1_1());
        write_source(&data_dir, &files.trait_associations, &gwas_catalog());
        write_source(&data_dir, &files.gene_summaries, &gene_summaries());

        let db_path = dir.path().join("genekb.sqlite3");

        TestKb {
            _dir: dir,
            config,
            db_path,
            data_dir,
        }
    }

    /// A fixture with every step of the build already run.
    pub fn built() -> TestKb {
        let kb = TestKb::new();
        kb.builder().all().unwrap();
        kb
    }

    pub fn builder(&self) -> DatabaseBuilder<'_> {
        DatabaseBuilder::new(&self.config, &self.db_path, &self.data_dir)
    }

    pub fn remove_source(&self, file_name: &str) {
        std::fs::remove_file(self.data_dir.join(file_name)).unwrap();
    }

    /// Write a new trait association file without the rows for one trait.
    pub fn rewrite_trait_associations_without(&self, reported_trait: &str) {
        let rows: Vec<_> = gwas_catalog_rows().into_iter()
            .filter(|row| !row.iter().any(|(column, value)| *column == "DISEASE/TRAIT" && *value == reported_trait))
            .collect();
        write_source(&self.data_dir, &self.config.data_files.trait_associations,
                     &table(&GWAS_HEADER, &rows));
    }

    pub fn connection(&self) -> Connection {
        Connection::open(&self.db_path).unwrap()
    }

    pub fn query_exec(&self, admin_token: Option<&str>) -> QueryExec {
        let cache = CacheBackend::Local(LocalCache::new(std::time::Duration::from_secs(60)));
        self.query_exec_with_cache(cache, admin_token)
    }

    pub fn query_exec_with_cache(&self, cache: CacheBackend, admin_token: Option<&str>) -> QueryExec {
        QueryExec::new(&self.db_path, cache, admin_token.map(str::to_owned))
    }
}

#[allow(dead_code)]
pub fn local_cache_len(query_exec: &QueryExec) -> usize {
    match query_exec.get_cache() {
        CacheBackend::Local(cache) => cache.len(),
        CacheBackend::Redis(_) => panic!("expected a local cache"),
    }
}
