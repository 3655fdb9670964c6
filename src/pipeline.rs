// src/pipeline.rs

use anyhow::{Context, Result};
use std::{
    collections::{btree_map, BTreeMap, HashSet},
    fs,
    path::{Path, PathBuf},
    thread::sleep,
    time::Duration,
};
use tracing::{debug, error, info, info_span, instrument, warn};

use crate::catalog::{create_dataset_showcase, Dataset, Locations, Resource, Showcase};
use crate::config::Config;
use crate::fetch::metadata::{Country, EndpointMetadata, StructureResponse};
use crate::fetch::{fetch_json, fetch_table, Downloader, RetryPolicy};
use crate::process::{
    chunk_years, prune_boilerplate_columns, relabel_columns, reshape, split_by, stamp_columns,
    RawTable, ReshapeOptions, TimePeriodMap,
};

/// Area-list entries that are regional or institutional aggregates.
const AGGREGATE_PREFIXES: &[&str] = &[
    "WB: ", "SDG:", "MDG:", "UIS:", "EFA:", "GEMR:", "AIMS:", "UNICEF:", "UNESCO:",
];

/// Characters replaced by `-` in output file names.
const RESERVED_FILENAME_CHARS: &[char] = &[' ', ':', '/', ',', '(', ')'];

/// Knobs of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub max_observations: u64,
    /// Download and merge all year chunks (true) or link each chunk's URL (false).
    pub merge_resources: bool,
    /// One dataset per country (true) or one per country and endpoint (false).
    pub single_dataset: bool,
    pub split_column: Option<String>,
    pub remove_useless_columns: bool,
    pub reshape: ReshapeOptions,
    pub retry: RetryPolicy,
    pub pause_between_endpoints: Duration,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_observations: config.max_observations,
            merge_resources: config.merge_resources,
            single_dataset: config.single_dataset,
            split_column: config.split_to_resources_by_column.clone(),
            remove_useless_columns: config.remove_useless_columns,
            reshape: config.reshape_options(),
            retry: config.retry_policy(),
            pause_between_endpoints: config.pause_between_endpoints(),
        }
    }
}

/// Country being processed, with its resolved ISO3 code.
#[derive(Debug, Clone)]
struct Target {
    iso2: String,
    iso3: String,
    name: String,
}

/// Everything shared by all countries of a run.
pub struct Pipeline<'a, D: Downloader, L: Locations> {
    downloader: &'a D,
    locations: &'a L,
    endpoints: &'a BTreeMap<String, EndpointMetadata>,
    folder: PathBuf,
    settings: PipelineSettings,
}

impl<'a, D: Downloader, L: Locations> Pipeline<'a, D, L> {
    pub fn new(
        downloader: &'a D,
        locations: &'a L,
        endpoints: &'a BTreeMap<String, EndpointMetadata>,
        folder: impl Into<PathBuf>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            downloader,
            locations,
            endpoints,
            folder: folder.into(),
            settings,
        }
    }

    /// Lazily produce the `(Dataset, Showcase)` pairs for one country.
    /// Per-endpoint mode yields as each endpoint completes (ascending endpoint
    /// id); single-dataset mode yields once after the last endpoint. Pairs
    /// without resources are dropped with an error log.
    pub fn generate_datasets(&self, country: &Country) -> CountryDatasets<'_, 'a, D, L> {
        let target = self.resolve(country);
        let mut combined = None;
        if let (Some(t), true) = (&target, self.settings.single_dataset) {
            let name = format!("UNESCO indicators - {}", t.name);
            let title = format!(
                "{} - Sustainable development, Education, Demographic and Socioeconomic Indicators",
                t.name
            );
            combined = Some(create_dataset_showcase(&name, &title, &t.name, &t.iso2, &t.iso3));
        }

        CountryDatasets {
            pipeline: self,
            done: target.is_none(),
            target,
            endpoints: self.endpoints.iter(),
            combined,
            earliest: None,
            latest: None,
        }
    }

    fn resolve(&self, country: &Country) -> Option<Target> {
        let name = country.name();
        if AGGREGATE_PREFIXES.iter().any(|p| name.starts_with(p)) {
            info!(country = %name, "ignoring aggregate");
            return None;
        }

        let iso3 = match self.locations.iso3_from_iso2(&country.id) {
            Some(iso3) => iso3,
            None => match self.locations.iso3_fuzzy(name) {
                Some(iso3) => {
                    info!(country = %name, %iso3, "matched by name");
                    iso3
                }
                None => {
                    error!(country = %name, "cannot get iso3 code");
                    return None;
                }
            },
        };

        Some(Target {
            iso2: country.id.clone(),
            iso3,
            name: name.to_string(),
        })
    }

    /// Fetch this endpoint's periods for the country and attach its resources
    /// to `dataset`. Returns the periods, or `None` when the endpoint has no data.
    #[instrument(level = "info", skip_all, fields(endpoint = %meta.id, country = %target.iso3))]
    fn add_endpoint(
        &self,
        target: &Target,
        meta: &EndpointMetadata,
        structure: &StructureResponse,
        dataset: &mut Dataset,
    ) -> Result<Option<TimePeriodMap>> {
        let periods = structure.structure.time_periods();
        if periods.is_empty() {
            warn!(indicator = %meta.indicator, country = %target.name, "no time periods");
            return Ok(None);
        }

        let csv_url = meta.csv_url(&target.iso2);
        let mut merged: Option<RawTable> = None;
        for range in chunk_years(&periods, self.settings.max_observations) {
            debug!(%range, "year chunk");
            if self.settings.merge_resources {
                let chunk = fetch_table(
                    self.downloader,
                    &csv_url,
                    range.start,
                    range.end,
                    &self.settings.retry,
                )?;
                if let Some(chunk) = chunk {
                    merged.get_or_insert_with(RawTable::default).append(chunk);
                }
            } else {
                let url = self.downloader.full_url(&format!(
                    "{}&startPeriod={}&endPeriod={}",
                    csv_url, range.start, range.end
                ));
                dataset.add_update_resource(Resource::link(
                    &format!("{} ({}-{})", meta.indicator, range.start, range.end),
                    &link_description(meta),
                    url,
                ));
            }
        }

        if let Some(table) = merged {
            let written = self.write_parts(target, meta, table)?;
            for resource in written {
                dataset.add_update_resource(resource);
            }
        }
        Ok(Some(periods))
    }

    /// Reshape, split and write one CSV per part.
    fn write_parts(
        &self,
        target: &Target,
        meta: &EndpointMetadata,
        table: RawTable,
    ) -> Result<Vec<Resource>> {
        let reshaped = reshape(table, &self.settings.reshape)?;
        if reshaped.num_rows() <= 1 {
            warn!(endpoint = %meta.id, "no observations after reshaping");
            return Ok(Vec::new());
        }

        let mut resources = Vec::new();
        let mut file_names = HashSet::new();
        for (value, mut part) in split_by(reshaped, self.settings.split_column.as_deref())? {
            if self.settings.remove_useless_columns {
                prune_boilerplate_columns(&mut part);
            }
            relabel_columns(&mut part, &self.settings.reshape.code_suffix);
            stamp_columns(&mut part, &target.iso3, value.as_deref());

            let file_name = unique_file_name(
                &mut file_names,
                output_file_name(&target.iso3, &meta.id, value.as_deref()),
            );
            let path = self.folder.join(file_name);
            part.write_csv(&path)?;
            debug!(path = %path.display(), rows = part.num_rows() - 1, "wrote resource");

            let (name, description) = match &value {
                Some(v) => (v.clone(), format!("Info on {} in {}", v, meta.indicator)),
                None => (meta.indicator.clone(), format!("Info on {}", meta.indicator)),
            };
            resources.push(Resource::upload(&name, &description, path));
        }
        Ok(resources)
    }
}

/// Lazy `(Dataset, Showcase)` sequence for one country; see
/// [`Pipeline::generate_datasets`].
pub struct CountryDatasets<'p, 'a, D: Downloader, L: Locations> {
    pipeline: &'p Pipeline<'a, D, L>,
    target: Option<Target>,
    endpoints: btree_map::Iter<'a, String, EndpointMetadata>,
    /// The single dataset being filled in single-dataset mode.
    combined: Option<(Dataset, Showcase)>,
    earliest: Option<i32>,
    latest: Option<i32>,
    done: bool,
}

impl<'p, 'a, D: Downloader, L: Locations> CountryDatasets<'p, 'a, D, L> {
    fn next_endpoint(
        &mut self,
        target: &Target,
        meta: &EndpointMetadata,
    ) -> Result<Option<(Dataset, Showcase)>> {
        let pipeline = self.pipeline;
        sleep(pipeline.settings.pause_between_endpoints);

        let url = meta.metadata_url(&target.iso2);
        let Some(structure) =
            fetch_json::<_, StructureResponse>(pipeline.downloader, &url, &pipeline.settings.retry)?
        else {
            warn!(endpoint = %meta.id, country = %target.name, "no structure metadata");
            return Ok(None);
        };

        if let Some((dataset, _)) = self.combined.as_mut() {
            if let Some(periods) = pipeline.add_endpoint(target, meta, &structure, dataset)? {
                self.widen_years(&periods);
            }
            return Ok(None);
        }

        let name = format!("UNESCO {} - {}", structure.structure.name, target.name);
        let (mut dataset, showcase) =
            create_dataset_showcase(&name, &name, &target.name, &target.iso2, &target.iso3);
        let Some(periods) = pipeline.add_endpoint(target, meta, &structure, &mut dataset)? else {
            return Ok(None);
        };

        if dataset.resources.is_empty() {
            error!(country = %target.name, endpoint = %meta.id, "no resources created");
            return Ok(None);
        }
        if let (Some(first), Some(last)) = (periods.keys().next(), periods.keys().next_back()) {
            dataset.set_year_range(*first, *last)?;
        }
        Ok(Some((dataset, showcase)))
    }

    fn widen_years(&mut self, periods: &TimePeriodMap) {
        if let Some(first) = periods.keys().next() {
            self.earliest = Some(self.earliest.map_or(*first, |e| e.min(*first)));
        }
        if let Some(last) = periods.keys().next_back() {
            self.latest = Some(self.latest.map_or(*last, |l| l.max(*last)));
        }
    }

    fn finish_combined(&mut self) -> Option<(Dataset, Showcase)> {
        let (mut dataset, showcase) = self.combined.take()?;
        let country = self.target.as_ref().map(|t| t.name.as_str()).unwrap_or_default();
        if dataset.resources.is_empty() {
            error!(%country, "no resources created");
            return None;
        }
        if let (Some(first), Some(last)) = (self.earliest, self.latest) {
            if let Err(e) = dataset.set_year_range(first, last) {
                error!(%country, error = %e, "invalid year range");
                return None;
            }
        }
        Some((dataset, showcase))
    }
}

impl<'p, 'a, D: Downloader, L: Locations> Iterator for CountryDatasets<'p, 'a, D, L> {
    type Item = (Dataset, Showcase);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let target = self.target.clone()?;
        let _span = info_span!("country", iso3 = %target.iso3).entered();

        loop {
            let Some((_, meta)) = self.endpoints.next() else {
                self.done = true;
                return self.finish_combined();
            };
            info!(endpoint = %meta.id, country = %target.name, "processing endpoint");

            match self.next_endpoint(&target, meta) {
                Ok(Some(pair)) => return Some(pair),
                Ok(None) => continue,
                Err(e) => {
                    error!(endpoint = %meta.id, country = %target.name, error = %e, "endpoint failed");
                    continue;
                }
            }
        }
    }
}

/// `UNESCO_{iso3}_{endpoint}[_{value}].csv` with reserved characters replaced.
pub fn output_file_name(iso3: &str, endpoint: &str, value: Option<&str>) -> String {
    let stem = match value {
        Some(v) => format!("UNESCO_{}_{}_{}", iso3, endpoint, v),
        None => format!("UNESCO_{}_{}", iso3, endpoint),
    };
    format!("{}.csv", stem.replace(RESERVED_FILENAME_CHARS, "-"))
}

/// `name`, or `name` with `_2`, `_3`, ... before the extension when an earlier
/// part of the same table already took it.
fn unique_file_name(taken: &mut HashSet<String>, name: String) -> String {
    if taken.insert(name.clone()) {
        return name;
    }
    let stem = name.strip_suffix(".csv").unwrap_or(&name);
    let mut n = 2;
    loop {
        let candidate = format!("{}_{}.csv", stem, n);
        if taken.insert(candidate.clone()) {
            warn!(file = %name, renamed = %candidate, "split values share a file name");
            return candidate;
        }
        n += 1;
    }
}

fn link_description(meta: &EndpointMetadata) -> String {
    let info = if meta.more_info_url.trim().is_empty() {
        meta.more_info_url.clone()
    } else {
        format!("[Info on {}]({})", meta.indicator, meta.more_info_url)
    };
    format!(
        "To save, right click download button & click Save Link/Target As  \n{}",
        info
    )
}

/// Write `{dataset.name}.json` holding the dataset and showcase records.
pub fn write_manifest(dir: &Path, dataset: &Dataset, showcase: &Showcase) -> Result<PathBuf> {
    let path = dir.join(format!("{}.json", dataset.name));
    let tmp_path = dir.join(format!(".{}.json.tmp", dataset.name));
    let body = serde_json::json!({ "dataset": dataset, "showcase": showcase });

    let mut text = serde_json::to_string_pretty(&body)?;
    text.push('\n');
    fs::write(&tmp_path, text).with_context(|| format!("writing {}", tmp_path.display()))?;
    fs::rename(&tmp_path, &path)
        .with_context(|| format!("renaming {} -> {}", tmp_path.display(), path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::locations::{CountryCode, CountryTable};
    use crate::fetch::FetchError;
    use serde_json::json;
    use std::cell::RefCell;
    use tempfile::tempdir;
    use tracing_subscriber::{fmt, EnvFilter};

    fn init_logging() {
        let _ = fmt()
            .with_env_filter(EnvFilter::new("debug"))
            .with_test_writer()
            .try_init();
    }

    const FINANCE_CSV: &str = "\
STAT_UNIT,UNIT_MEASURE,EDU_LEVEL,REF_AREA,TIME_PERIOD,OBS_VALUE
XUNIT: Government expenditure per student,PPP: PPP dollars,L1: Primary education,AR: Argentina,2013,2100.5
XUNIT: Government expenditure per student,PPP: PPP dollars,L2: Lower secondary education,AR: Argentina,2013,
XUNIT: Government expenditure per student,PPP: PPP dollars,L1: Primary education,AR: Argentina,2014,2230
XEXP: Expenditure on education,PT: Percentage,_T: All levels,AR: Argentina,2014,5.1
";

    /// Canned UNESCO API for one endpoint (`EDU_FINANCE`) and one country (`AR`).
    struct FakeApi {
        requested: RefCell<Vec<String>>,
        /// structure ids whose TIME_PERIOD dimension is empty
        no_periods: Vec<&'static str>,
        /// endpoint → CSV export; endpoints not listed have no data
        csv: Vec<(&'static str, &'static str)>,
    }

    impl FakeApi {
        fn new() -> Self {
            Self {
                requested: RefCell::new(Vec::new()),
                no_periods: Vec::new(),
                csv: vec![("EDU_FINANCE", FINANCE_CSV)],
            }
        }

        fn csv_requests(&self) -> Vec<String> {
            self.requested
                .borrow()
                .iter()
                .filter(|u| u.contains("format=csv"))
                .cloned()
                .collect()
        }
    }

    impl Downloader for FakeApi {
        fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            self.requested.borrow_mut().push(url.to_string());
            let endpoint = ["EDU_FINANCE", "EDU_NON_FINANCE"]
                .into_iter()
                .find(|e| url.contains(&format!("UNESCO,{}/", e)))
                .ok_or_else(|| FetchError::NotFound {
                    url: url.to_string(),
                })?;

            if url.contains("format=csv") {
                return match self.csv.iter().find(|(e, _)| *e == endpoint) {
                    Some((_, body)) => Ok(body.as_bytes().to_vec()),
                    None => Err(FetchError::NotFound {
                        url: url.to_string(),
                    }),
                };
            }

            let values = if self.no_periods.contains(&endpoint) {
                json!([])
            } else {
                json!([{"id": "2013", "actualObs": 1000}, {"id": "2014", "actualObs": 1000}])
            };
            let name = if endpoint == "EDU_FINANCE" {
                "Education: Financial resources"
            } else {
                "Education: Other policy relevant indicators"
            };
            let body = json!({"structure": {
                "name": name,
                "dimensions": {"observation": [
                    {"id": "STAT_UNIT"},
                    {"id": "REF_AREA"},
                    {"id": "TIME_PERIOD", "values": values}
                ]}
            }});
            Ok(serde_json::to_vec(&body).unwrap())
        }

        fn full_url(&self, url: &str) -> String {
            format!("{}&locale=en&subscription-key=12345", url)
        }
    }

    fn endpoints(ids: &[&str]) -> BTreeMap<String, EndpointMetadata> {
        ids.iter()
            .map(|id| {
                (
                    id.to_string(),
                    EndpointMetadata {
                        id: id.to_string(),
                        indicator: format!("Indicator {}", id),
                        base_dataurl: format!("http://yyyy/data/UNESCO,{}/", id),
                        dimension_ids: vec![
                            "STAT_UNIT".into(),
                            "REF_AREA".into(),
                            "TIME_PERIOD".into(),
                        ],
                        more_info_url: "http://uis.unesco.org/en/topic/education-finance".into(),
                    },
                )
            })
            .collect()
    }

    fn locations() -> CountryTable {
        CountryTable::new(&[CountryCode {
            iso2: "AR".into(),
            iso3: "ARG".into(),
            name: "Argentina".into(),
        }])
    }

    fn settings() -> PipelineSettings {
        PipelineSettings {
            max_observations: 1800,
            merge_resources: true,
            single_dataset: false,
            split_column: Some("STAT_UNIT".to_string()),
            remove_useless_columns: true,
            reshape: ReshapeOptions::default(),
            retry: RetryPolicy {
                quota_backoff: Duration::ZERO,
                transient_backoff: Duration::ZERO,
                max_transient_retries: 0,
            },
            pause_between_endpoints: Duration::ZERO,
        }
    }

    fn argentina() -> Country {
        Country::new("AR", "Argentina")
    }

    #[test]
    fn test_per_endpoint_dataset() -> Result<()> {
        init_logging();
        let dir = tempdir()?;
        let api = FakeApi::new();
        let eps = endpoints(&["EDU_FINANCE"]);
        let locs = locations();
        let pipeline = Pipeline::new(&api, &locs, &eps, dir.path(), settings());

        let pairs: Vec<_> = pipeline.generate_datasets(&argentina()).collect();
        assert_eq!(pairs.len(), 1);
        let (dataset, showcase) = &pairs[0];

        assert_eq!(dataset.name, "unesco-education-financial-resources-argentina");
        assert_eq!(dataset.title, "UNESCO Education: Financial resources - Argentina");
        assert_eq!(dataset.dataset_date.as_deref(), Some("01/01/2013-12/31/2014"));
        assert_eq!(showcase.name, "unesco-education-financial-resources-argentina-showcase");

        let names: Vec<_> = dataset.resources.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Expenditure on education", "Government expenditure per student"]
        );
        assert_eq!(
            dataset.resources[1].description,
            "Info on Government expenditure per student in Indicator EDU_FINANCE"
        );

        // 2000 observations over a cap of 1800: two chunk requests, newest first
        let csv = api.csv_requests();
        assert_eq!(csv.len(), 2);
        assert!(csv[0].ends_with(
            ".AR.?format=csv&startPeriod=2014&endPeriod=2014&locale=en&subscription-key=12345"
        ));
        assert!(csv[1].contains("startPeriod=2013&endPeriod=2013"));

        let path = dir
            .path()
            .join("UNESCO_ARG_EDU_FINANCE_Government-expenditure-per-student.csv");
        let written = RawTable::from_csv_str(&fs::read_to_string(&path)?)?;
        assert_eq!(
            written.headers,
            vec![
                "Unit of measure",
                "Level of education",
                "Reference area",
                "Time Period",
                "OBS_VALUE",
                "country-iso3",
                "Indicator name"
            ]
        );
        // HXL row + 2 rows per chunk, each chunk lost its empty value row
        assert_eq!(written.num_rows(), 5);
        assert_eq!(written.rows[0][3].to_string(), "#date");
        assert_eq!(written.rows[0][4].to_string(), "#indicator+value+num");
        assert_eq!(written.rows[1][5].to_string(), "ARG");
        Ok(())
    }

    #[test]
    fn test_boilerplate_columns_pruned_per_part() -> Result<()> {
        let dir = tempdir()?;
        let api = FakeApi::new();
        let eps = endpoints(&["EDU_FINANCE"]);
        let locs = locations();
        let pipeline = Pipeline::new(&api, &locs, &eps, dir.path(), settings());
        let _ = pipeline.generate_datasets(&argentina()).count();

        let path = dir
            .path()
            .join("UNESCO_ARG_EDU_FINANCE_Expenditure-on-education.csv");
        let written = RawTable::from_csv_str(&fs::read_to_string(path)?)?;
        // "All levels" is the only education level in this part
        assert!(!written.has_column("Level of education"));
        assert!(written.has_column("Unit of measure"));
        Ok(())
    }

    #[test]
    fn test_endpoints_without_data_are_skipped() -> Result<()> {
        let dir = tempdir()?;
        let mut api = FakeApi::new();
        api.no_periods = vec!["EDU_NON_FINANCE"];
        let eps = endpoints(&["EDU_NON_FINANCE", "EDU_FINANCE"]);
        let locs = locations();
        let pipeline = Pipeline::new(&api, &locs, &eps, dir.path(), settings());

        let pairs: Vec<_> = pipeline.generate_datasets(&argentina()).collect();
        assert_eq!(pairs.len(), 1);
        assert!(pairs[0].0.title.contains("Financial resources"));
        Ok(())
    }

    #[test]
    fn test_not_found_chunks_yield_no_dataset() -> Result<()> {
        let dir = tempdir()?;
        let api = FakeApi::new();
        let eps = endpoints(&["EDU_NON_FINANCE"]);
        let locs = locations();
        let pipeline = Pipeline::new(&api, &locs, &eps, dir.path(), settings());

        assert_eq!(pipeline.generate_datasets(&argentina()).count(), 0);
        Ok(())
    }

    #[test]
    fn test_single_dataset_yields_once() -> Result<()> {
        let dir = tempdir()?;
        let api = FakeApi::new();
        let eps = endpoints(&["EDU_FINANCE", "EDU_NON_FINANCE"]);
        let locs = locations();
        let mut s = settings();
        s.single_dataset = true;
        let pipeline = Pipeline::new(&api, &locs, &eps, dir.path(), s);

        let pairs: Vec<_> = pipeline.generate_datasets(&argentina()).collect();
        assert_eq!(pairs.len(), 1);
        let (dataset, showcase) = &pairs[0];
        assert_eq!(dataset.name, "unesco-indicators-argentina");
        assert_eq!(
            dataset.title,
            "Argentina - Sustainable development, Education, Demographic and Socioeconomic Indicators"
        );
        assert_eq!(showcase.title, "UNESCO indicators - Argentina");
        assert_eq!(dataset.resources.len(), 2);
        assert_eq!(dataset.dataset_date.as_deref(), Some("01/01/2013-12/31/2014"));
        Ok(())
    }

    #[test]
    fn test_single_dataset_without_resources_is_suppressed() -> Result<()> {
        let dir = tempdir()?;
        let api = FakeApi::new();
        let eps = endpoints(&["EDU_NON_FINANCE"]);
        let locs = locations();
        let mut s = settings();
        s.single_dataset = true;
        let pipeline = Pipeline::new(&api, &locs, &eps, dir.path(), s);

        assert_eq!(pipeline.generate_datasets(&argentina()).count(), 0);
        Ok(())
    }

    #[test]
    fn test_link_resources_per_chunk() -> Result<()> {
        let dir = tempdir()?;
        let api = FakeApi::new();
        let eps = endpoints(&["EDU_FINANCE"]);
        let locs = locations();
        let mut s = settings();
        s.merge_resources = false;
        let pipeline = Pipeline::new(&api, &locs, &eps, dir.path(), s);

        let pairs: Vec<_> = pipeline.generate_datasets(&argentina()).collect();
        let resources = &pairs[0].0.resources;
        let names: Vec<_> = resources.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Indicator EDU_FINANCE (2014-2014)", "Indicator EDU_FINANCE (2013-2013)"]
        );
        assert!(resources[0].url.as_deref().unwrap().contains("startPeriod=2014"));
        assert!(resources[0]
            .description
            .ends_with("[Info on Indicator EDU_FINANCE](http://uis.unesco.org/en/topic/education-finance)"));
        assert!(api.csv_requests().is_empty());
        Ok(())
    }

    #[test]
    fn test_unsplit_single_resource() -> Result<()> {
        let dir = tempdir()?;
        let api = FakeApi::new();
        let eps = endpoints(&["EDU_FINANCE"]);
        let locs = locations();
        let mut s = settings();
        s.split_column = None;
        let pipeline = Pipeline::new(&api, &locs, &eps, dir.path(), s);

        let pairs: Vec<_> = pipeline.generate_datasets(&argentina()).collect();
        let resources = &pairs[0].0.resources;
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].name, "Indicator EDU_FINANCE");
        assert!(dir.path().join("UNESCO_ARG_EDU_FINANCE.csv").exists());
        Ok(())
    }

    #[test]
    fn test_aggregates_and_unknown_countries_are_skipped() {
        let dir = tempdir().unwrap();
        let api = FakeApi::new();
        let eps = endpoints(&["EDU_FINANCE"]);
        let locs = locations();
        let pipeline = Pipeline::new(&api, &locs, &eps, dir.path(), settings());

        assert_eq!(
            pipeline
                .generate_datasets(&Country::new("40330", "SDG: Northern Africa"))
                .count(),
            0
        );
        assert_eq!(
            pipeline.generate_datasets(&Country::new("XX", "Atlantis")).count(),
            0
        );
        assert!(api.requested.borrow().is_empty());
    }

    #[test]
    fn test_fuzzy_country_match() {
        let dir = tempdir().unwrap();
        let api = FakeApi::new();
        let eps = endpoints(&["EDU_FINANCE"]);
        let locs = locations();
        let pipeline = Pipeline::new(&api, &locs, &eps, dir.path(), settings());

        // unknown code but a recognisable name
        let pairs: Vec<_> = pipeline.generate_datasets(&Country::new("ZZ", "ARGENTINA")).collect();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].0.groups[0].name, "arg");
        assert!(dir.path().join("UNESCO_ARG_EDU_FINANCE_Expenditure-on-education.csv").exists());
    }

    #[test]
    fn test_per_endpoint_datasets_are_yielded_one_at_a_time() -> Result<()> {
        let dir = tempdir()?;
        let mut api = FakeApi::new();
        api.csv.push(("EDU_NON_FINANCE", FINANCE_CSV));
        let eps = endpoints(&["EDU_NON_FINANCE", "EDU_FINANCE"]);
        let locs = locations();
        let pipeline = Pipeline::new(&api, &locs, &eps, dir.path(), settings());
        let country = argentina();
        let mut datasets = pipeline.generate_datasets(&country);

        let (first, _) = datasets.next().expect("first dataset");
        assert_eq!(first.title, "UNESCO Education: Financial resources - Argentina");
        assert!(api
            .requested
            .borrow()
            .iter()
            .all(|u| !u.contains("EDU_NON_FINANCE")));

        let (second, _) = datasets.next().expect("second dataset");
        assert_eq!(
            second.title,
            "UNESCO Education: Other policy relevant indicators - Argentina"
        );
        assert!(!second.resources.is_empty());
        assert!(datasets.next().is_none());
        Ok(())
    }

    #[test]
    fn test_colliding_file_names_get_a_suffix() -> Result<()> {
        let dir = tempdir()?;
        let mut api = FakeApi::new();
        api.csv = vec![(
            "EDU_FINANCE",
            "STAT_UNIT,TIME_PERIOD,OBS_VALUE\n\
             X1: Ratio A/B,2014,1\n\
             X2: Ratio A-B,2014,2\n",
        )];
        let eps = endpoints(&["EDU_FINANCE"]);
        let locs = locations();
        let pipeline = Pipeline::new(&api, &locs, &eps, dir.path(), settings());

        let pairs: Vec<_> = pipeline.generate_datasets(&argentina()).collect();
        let resources = &pairs[0].0.resources;
        assert_eq!(resources.len(), 2);
        assert_eq!(resources[0].name, "Ratio A-B");
        assert_eq!(
            resources[0].file_to_upload,
            Some(dir.path().join("UNESCO_ARG_EDU_FINANCE_Ratio-A-B.csv"))
        );
        assert_eq!(
            resources[1].file_to_upload,
            Some(dir.path().join("UNESCO_ARG_EDU_FINANCE_Ratio-A-B_2.csv"))
        );

        let first = fs::read_to_string(dir.path().join("UNESCO_ARG_EDU_FINANCE_Ratio-A-B.csv"))?;
        let second =
            fs::read_to_string(dir.path().join("UNESCO_ARG_EDU_FINANCE_Ratio-A-B_2.csv"))?;
        assert!(first.contains("Ratio A-B"));
        assert!(second.contains("Ratio A/B"));
        Ok(())
    }

    #[test]
    fn test_unique_file_name() {
        let mut taken = HashSet::new();
        assert_eq!(unique_file_name(&mut taken, "a.csv".into()), "a.csv");
        assert_eq!(unique_file_name(&mut taken, "a.csv".into()), "a_2.csv");
        assert_eq!(unique_file_name(&mut taken, "a.csv".into()), "a_3.csv");
        assert_eq!(unique_file_name(&mut taken, "b.csv".into()), "b.csv");
    }

    #[test]
    fn test_output_file_name() {
        assert_eq!(
            output_file_name("ARG", "EDU_FINANCE", Some("Ratio: pupils/teacher (ISCED 1), total")),
            "UNESCO_ARG_EDU_FINANCE_Ratio--pupils-teacher--ISCED-1---total.csv"
        );
        assert_eq!(output_file_name("ARG", "X", None), "UNESCO_ARG_X.csv");
    }

    #[test]
    fn test_write_manifest() -> Result<()> {
        let dir = tempdir()?;
        let (dataset, showcase) = create_dataset_showcase("A b", "A b", "Argentina", "AR", "ARG");
        let path = write_manifest(dir.path(), &dataset, &showcase)?;
        assert_eq!(path, dir.path().join("a-b.json"));

        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
        assert_eq!(value["dataset"]["name"], "a-b");
        assert_eq!(value["showcase"]["url"], "http://uis.unesco.org/en/country/AR");
        Ok(())
    }
}
