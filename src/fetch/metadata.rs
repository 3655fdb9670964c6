// src/fetch/metadata.rs

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument, warn};

use super::download::{fetch_json, RetryPolicy};
use super::Downloader;
use crate::process::TimePeriodMap;

/// Query suffix for structure-only metadata requests.
pub const STRUCTURE_QUERY: &str = "format=sdmx-json&detail=structureonly&includeMetrics=true";
const AREA_DIMENSION: &str = "REF_AREA";
const TIME_DIMENSION: &str = "TIME_PERIOD";

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LocalisedName {
    pub value: String,
}

/// One entry of the UNESCO area code list.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Country {
    /// ISO 3166-1 alpha-2 code, or a UIS-specific code for aggregates.
    pub id: String,
    pub names: Vec<LocalisedName>,
}

impl Country {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            names: vec![LocalisedName {
                value: name.to_string(),
            }],
        }
    }

    pub fn name(&self) -> &str {
        self.names.first().map(|n| n.value.as_str()).unwrap_or(&self.id)
    }
}

#[derive(Debug, Deserialize)]
struct CodelistResponse {
    #[serde(rename = "Codelist")]
    codelist: Vec<Codelist>,
}

#[derive(Debug, Deserialize)]
struct Codelist {
    items: Vec<Country>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StructureResponse {
    pub structure: Structure,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Structure {
    pub name: String,
    pub dimensions: Dimensions,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Dimensions {
    #[serde(default)]
    pub observation: Vec<ObservationDimension>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservationDimension {
    pub id: String,
    #[serde(default)]
    pub values: Vec<DimensionValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DimensionValue {
    pub id: String,
    #[serde(rename = "actualObs", default)]
    pub actual_obs: u64,
}

impl Structure {
    /// Year → observation count from the `TIME_PERIOD` dimension.
    pub fn time_periods(&self) -> TimePeriodMap {
        let mut periods = TimePeriodMap::new();
        for dim in self.dimensions.observation.iter().filter(|d| d.id == TIME_DIMENSION) {
            for value in &dim.values {
                match value.id.trim().parse::<i32>() {
                    Ok(year) => {
                        periods.insert(year, value.actual_obs);
                    }
                    Err(_) => warn!(period = %value.id, "skipping non-year time period"),
                }
            }
        }
        periods
    }
}

/// What the pipeline needs to know about one dataflow.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointMetadata {
    pub id: String,
    /// Indicator (dataflow) name, e.g. "Education: Financial resources".
    pub indicator: String,
    /// `{base}data/UNESCO,{id}/`
    pub base_dataurl: String,
    /// Observation dimension ids in key order.
    pub dimension_ids: Vec<String>,
    /// Link to the provider's topic page, or `" "` when there is none.
    pub more_info_url: String,
}

impl EndpointMetadata {
    /// Data URL prefix for one area: one key segment per dimension, the area
    /// code in the `REF_AREA` slot, ending in `?`.
    pub fn structure_url(&self, area: &str) -> String {
        let mut url = self.base_dataurl.clone();
        for dim in &self.dimension_ids {
            if dim == AREA_DIMENSION {
                url.push_str(area);
            } else {
                url.push('.');
            }
        }
        url.push('?');
        url
    }

    pub fn metadata_url(&self, area: &str) -> String {
        format!("{}{}", self.structure_url(area), STRUCTURE_QUERY)
    }

    pub fn csv_url(&self, area: &str) -> String {
        format!("{}format=csv", self.structure_url(area))
    }
}

/// Fetch the UNESCO area code list.
#[instrument(level = "info", skip(downloader, policy))]
pub fn get_countries<D: Downloader>(
    base_url: &str,
    downloader: &D,
    policy: &RetryPolicy,
) -> Result<Vec<Country>> {
    let url = format!("{}codelist/UNESCO/CL_AREA/latest?format=sdmx-json", base_url);
    let response: CodelistResponse = fetch_json(downloader, &url, policy)?
        .with_context(|| format!("area code list not found at {}", url))?;
    let countries = response
        .codelist
        .into_iter()
        .next()
        .map(|c| c.items)
        .unwrap_or_default();
    info!(count = countries.len(), "fetched area code list");
    Ok(countries)
}

/// Fetch the structure of every configured endpoint, in ascending id order.
/// `endpoints` maps endpoint id → more-info URL.
#[instrument(level = "info", skip_all)]
pub fn get_endpoints_metadata<D: Downloader>(
    base_url: &str,
    downloader: &D,
    endpoints: &BTreeMap<String, String>,
    policy: &RetryPolicy,
) -> Result<BTreeMap<String, EndpointMetadata>> {
    let mut out = BTreeMap::new();
    for (id, more_info_url) in endpoints {
        let base_dataurl = format!("{}data/UNESCO,{}/", base_url, id);
        let url = format!("{}?{}", base_dataurl, STRUCTURE_QUERY);

        let Some(response) = fetch_json::<_, StructureResponse>(downloader, &url, policy)? else {
            warn!(endpoint = %id, "no structure for endpoint, skipping");
            continue;
        };
        let structure = response.structure;
        debug!(
            endpoint = %id,
            indicator = %structure.name,
            dimensions = structure.dimensions.observation.len(),
            "endpoint structure"
        );

        out.insert(
            id.clone(),
            EndpointMetadata {
                id: id.clone(),
                indicator: structure.name,
                base_dataurl,
                dimension_ids: structure
                    .dimensions
                    .observation
                    .into_iter()
                    .map(|d| d.id)
                    .collect(),
                more_info_url: more_info_url.clone(),
            },
        );
    }
    Ok(out)
}
