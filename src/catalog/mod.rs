// src/catalog/mod.rs
//! Records handed to the HDX uploader: datasets, their resources, showcases.

pub mod locations;

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use locations::{CountryTable, Locations};

pub const MAINTAINER_ID: &str = "196196be-6037-4488-8b71-d786adf4c081";
pub const ORGANIZATION_ID: &str = "18f2d467-dcf8-4b7e-bffa-b3c338ba3a7c";
/// HDX encodes "Every year" as 365 days.
pub const UPDATE_FREQUENCY_YEARLY: &str = "365";
pub const TAGS: &[&str] = &[
    "indicators",
    "sustainable development",
    "demographics",
    "socioeconomics",
    "education",
];
pub const SHOWCASE_IMAGE_URL: &str = "http://www.tellmaps.com/uis/internal/assets/uisheader-en.png";

const LONG_COUNTRY_SLUG: &str = "united-kingdom-of-great-britain-and-northern-ireland";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    pub description: String,
    pub format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_to_upload: Option<PathBuf>,
    pub resource_type: String,
    pub url_type: String,
}

impl Resource {
    /// A CSV file on disk that the uploader attaches to the dataset.
    pub fn upload(name: &str, description: &str, path: PathBuf) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            format: "csv".to_string(),
            url: None,
            file_to_upload: Some(path),
            resource_type: "file.upload".to_string(),
            url_type: "upload".to_string(),
        }
    }

    /// A CSV served directly by the provider.
    pub fn link(name: &str, description: &str, url: String) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            format: "csv".to_string(),
            url: Some(url),
            file_to_upload: None,
            resource_type: "api".to_string(),
            url_type: "api".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    pub name: String,
    pub title: String,
    pub maintainer: String,
    pub owner_org: String,
    pub subnational: String,
    pub groups: Vec<Group>,
    pub data_update_frequency: String,
    pub tags: Vec<Tag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset_date: Option<String>,
    pub resources: Vec<Resource>,
}

impl Dataset {
    pub fn new(name: &str, title: &str) -> Self {
        Self {
            name: name.to_string(),
            title: title.to_string(),
            maintainer: MAINTAINER_ID.to_string(),
            owner_org: ORGANIZATION_ID.to_string(),
            subnational: "0".to_string(),
            groups: Vec::new(),
            data_update_frequency: UPDATE_FREQUENCY_YEARLY.to_string(),
            tags: Vec::new(),
            dataset_date: None,
            resources: Vec::new(),
        }
    }

    pub fn add_country_location(&mut self, iso3: &str) {
        let name = iso3.to_lowercase();
        if !self.groups.iter().any(|g| g.name == name) {
            self.groups.push(Group { name });
        }
    }

    pub fn add_tags(&mut self, tags: &[&str]) {
        for t in tags {
            if !self.tags.iter().any(|x| x.name == *t) {
                self.tags.push(Tag {
                    name: t.to_string(),
                });
            }
        }
    }

    /// Add `resource`, replacing any existing resource with the same name.
    pub fn add_update_resource(&mut self, resource: Resource) {
        match self.resources.iter_mut().find(|r| r.name == resource.name) {
            Some(existing) => *existing = resource,
            None => self.resources.push(resource),
        }
    }

    /// `dataset_date` spanning 1 January of `start` to 31 December of `end`.
    pub fn set_year_range(&mut self, start: i32, end: i32) -> Result<()> {
        let from = NaiveDate::from_ymd_opt(start, 1, 1)
            .ok_or_else(|| anyhow!("invalid start year {}", start))?;
        let to = NaiveDate::from_ymd_opt(end, 12, 31)
            .ok_or_else(|| anyhow!("invalid end year {}", end))?;
        if from > to {
            return Err(anyhow!("year range {}-{} is inverted", start, end));
        }
        self.dataset_date = Some(format!(
            "{}-{}",
            from.format("%m/%d/%Y"),
            to.format("%m/%d/%Y")
        ));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Showcase {
    pub name: String,
    pub title: String,
    pub notes: String,
    pub url: String,
    pub image_url: String,
    pub tags: Vec<Tag>,
}

/// Dataset and showcase for one country (and endpoint, unless single-dataset).
pub fn create_dataset_showcase(
    name: &str,
    title: &str,
    country_name: &str,
    iso2: &str,
    iso3: &str,
) -> (Dataset, Showcase) {
    let slug = slugify(name).replace(LONG_COUNTRY_SLUG, "uk");

    let mut dataset = Dataset::new(&slug, title);
    dataset.add_country_location(iso3);
    dataset.add_tags(TAGS);

    let showcase = Showcase {
        name: format!("{}-showcase", slug),
        title: name.to_string(),
        notes: format!("Education, literacy and other indicators for {}", country_name),
        url: format!("http://uis.unesco.org/en/country/{}", iso2),
        image_url: SHOWCASE_IMAGE_URL.to_string(),
        tags: dataset.tags.clone(),
    };
    (dataset, showcase)
}

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid regex"));

/// Lowercase ASCII slug: accents folded, runs of other characters become `-`.
pub fn slugify(text: &str) -> String {
    let mut folded = String::with_capacity(text.len());
    for c in text.to_lowercase().chars() {
        match fold_accent(c) {
            Some(s) => folded.push_str(s),
            None => folded.push(c),
        }
    }
    NON_ALNUM
        .replace_all(&folded, "-")
        .trim_matches('-')
        .to_string()
}

pub(crate) fn fold_accent(c: char) -> Option<&'static str> {
    let folded = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => "a",
        'æ' => "ae",
        'ç' => "c",
        'è' | 'é' | 'ê' | 'ë' => "e",
        'ì' | 'í' | 'î' | 'ï' => "i",
        'ñ' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => "o",
        'œ' => "oe",
        'ß' => "ss",
        'ù' | 'ú' | 'û' | 'ü' => "u",
        'ý' | 'ÿ' => "y",
        _ => return None,
    };
    Some(folded)
}
