// src/process/tags.rs

use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

/// One known column of the UNESCO exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimension {
    /// SDMX short code as it appears in `format=csv` exports (e.g. `STAT_UNIT`).
    pub code: Option<&'static str>,
    /// Human-readable label as it appears in labelled exports.
    pub label: Option<&'static str>,
    pub tag: &'static str,
    /// Cells hold `"CODE: Label"` compounds.
    pub splittable: bool,
}

const fn dim(
    code: Option<&'static str>,
    label: Option<&'static str>,
    tag: &'static str,
    splittable: bool,
) -> Dimension {
    Dimension {
        code,
        label,
        tag,
        splittable,
    }
}

pub static DIMENSIONS: &[Dimension] = &[
    dim(Some("AGE"), Some("Age"), "#group+age", true),
    dim(Some("COUNTRY_ORIGIN"), Some("Country / region of origin"), "#country+origin", true),
    dim(Some("REGION_DEST"), Some("Destination region"), "#region+destination", true),
    dim(Some("EDU_FIELD"), Some("Field of education"), "#indicator+education+field+name", true),
    dim(Some("FUND_FLOW"), Some("Funding flow"), "#indicator+funding+flow+name", true),
    dim(Some("GRADE"), Some("Grade"), "#indicator+grade", true),
    dim(Some("IMM_STATUS"), Some("Immigration status"), "#indicator+immigration+status", true),
    dim(Some("INFRASTR"), Some("Infrastructure"), "#indicator+infrastructure", true),
    dim(Some("EDU_LEVEL"), Some("Level of education"), "#group+education+level", true),
    dim(
        Some("EDU_ATTAIN"),
        Some("Level of educational attainment"),
        "#group+education+level+attainment",
        true,
    ),
    dim(Some("LOCATION"), Some("Location"), "#geo+location+type", true),
    dim(None, Some("Orientation"), "#indicator+orientation", true),
    dim(Some("REF_AREA"), Some("Reference area"), "#geo+reference+area", true),
    dim(Some("SUBJECT"), Some("School subject"), "#indicator+school+subject+name", true),
    dim(Some("SEX"), Some("Sex"), "#group+sex", true),
    dim(Some("SE_BKGRD"), Some("Socioeconomic background"), "#group+socioeconomic+background", true),
    dim(Some("SOURCE_FUND"), Some("Source of funding"), "#indicator+funding+source", true),
    dim(Some("STAT_UNIT"), Some("Statistical unit"), "#indicator+statistical+unit", true),
    dim(
        Some("TEACH_EXPERIENCE"),
        Some("Teaching experience"),
        "#indicator+teaching+experience",
        true,
    ),
    dim(Some("TIME_PERIOD"), Some("Time Period"), "#date", true),
    dim(Some("CONTRACT_TYPE"), Some("Type of contract"), "#indicator+contract+name", true),
    dim(Some("EDU_TYPE"), Some("Type of education"), "#indicator+education+type+name", true),
    dim(
        Some("EXPENDITURE_TYPE"),
        Some("Type of expenditure"),
        "#indicator+expenditure+type+name",
        true,
    ),
    dim(None, Some("Type of institution"), "#indicator+institution+type+name", true),
    dim(Some("UNIT_MEASURE"), Some("Unit of measure"), "#meta+unit+measure+name", true),
    dim(Some("WEALTH_QUINTILE"), Some("Wealth quintile"), "#indicator+wealth+quintile+name", true),
    // code-only columns, never compound
    dim(Some("BASIC_SERVICES"), None, "#indicator+basic+services", false),
    dim(Some("CLASS_TYPE"), None, "#indicator+class+name", false),
    dim(Some("EDU_CAT"), None, "#indicator+education+category+name", false),
    dim(Some("FREQ"), None, "#indicator+frequency", false),
    dim(Some("SECTOR_EDU"), None, "#indicator+sector+name", false),
    dim(Some("UNIT_MULT"), None, "#meta+unit+mult+name", false),
    dim(Some("DECIMALS"), None, "#meta+decimals", false),
];

/// Values that carry no information when they are the only value of a column.
static BOILERPLATE_VALUES: &[&str] = &["total", "_t", "not applicable", "_z", "na"];
const BOILERPLATE_PREFIX: &str = "all ";

/// Column name (code or label) → HXL tag.
static TAGS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for d in DIMENSIONS {
        for name in d.code.iter().chain(d.label.iter()) {
            map.insert(*name, d.tag);
        }
    }
    map
});

static SPLITTABLE: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    DIMENSIONS
        .iter()
        .filter(|d| d.splittable)
        .flat_map(|d| d.code.into_iter().chain(d.label))
        .collect()
});

static LABELS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    DIMENSIONS
        .iter()
        .filter_map(|d| Some((d.code?, d.label?)))
        .collect()
});

pub fn tag_for(column: &str) -> Option<&'static str> {
    TAGS.get(column).copied()
}

/// Whether cells of `column` are `"CODE: Label"` compounds.
pub fn is_splittable(column: &str) -> bool {
    SPLITTABLE.contains(column)
}

/// Human-readable label for a dimension short code.
pub fn label_for_code(code: &str) -> Option<&'static str> {
    LABELS.get(code).copied()
}

/// Case-insensitive check against the boilerplate vocabulary.
pub fn is_boilerplate(value: &str) -> bool {
    let lower = value.to_lowercase();
    BOILERPLATE_VALUES.contains(&lower.as_str()) || lower.starts_with(BOILERPLATE_PREFIX)
}
