use flexstr::SharedStr as FlexStr;

pub type GeneId = i64;
pub type TaxonId = u32;

pub type GeneSymbol = FlexStr;
pub type GeneName = FlexStr;
pub type ChromosomeName = FlexStr;
pub type MapLocation = FlexStr;
pub type GeneTypeName = FlexStr;

pub type OntologyId = FlexStr;
pub type OntologyTermName = FlexStr;

pub type ReleaseVersion = FlexStr;
pub type StudyAccession = FlexStr;
pub type TraitName = FlexStr;

pub type CacheKey = String;
