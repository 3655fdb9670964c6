// src/catalog/locations.rs

use rapidfuzz::distance::jaro_winkler;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

use super::fold_accent;

/// Minimum Jaro-Winkler similarity for a name match.
const FUZZY_THRESHOLD: f64 = 0.95;

/// Resolves UNESCO area codes to the ISO3 codes HDX uses for locations.
pub trait Locations {
    fn iso3_from_iso2(&self, iso2: &str) -> Option<String>;

    /// Best-effort match on a country's display name.
    fn iso3_fuzzy(&self, name: &str) -> Option<String>;
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CountryCode {
    pub iso2: String,
    pub iso3: String,
    pub name: String,
}

/// In-memory ISO2/ISO3/name table, usually loaded from configuration.
#[derive(Debug, Clone, Default)]
pub struct CountryTable {
    by_iso2: HashMap<String, String>,
    /// (normalised name, iso3); a name with a parenthesised qualifier is also
    /// stored without it
    names: Vec<(String, String)>,
}

impl CountryTable {
    pub fn new(codes: &[CountryCode]) -> Self {
        let mut table = Self::default();
        for c in codes {
            let iso3 = c.iso3.to_uppercase();
            table.by_iso2.insert(c.iso2.to_uppercase(), iso3.clone());
            table.names.push((normalise(&c.name), iso3.clone()));

            // "Bolivia (Plurinational State of)" → "bolivia"
            if let Some((short, _)) = c.name.split_once('(') {
                let short = normalise(short);
                if !short.is_empty() {
                    table.names.push((short, iso3));
                }
            }
        }
        table
    }
}

impl Locations for CountryTable {
    fn iso3_from_iso2(&self, iso2: &str) -> Option<String> {
        self.by_iso2.get(&iso2.trim().to_uppercase()).cloned()
    }

    fn iso3_fuzzy(&self, name: &str) -> Option<String> {
        let query = normalise(name);
        if query.is_empty() {
            return None;
        }

        let mut best: Option<(f64, &str)> = None;
        let mut tied = false;
        for (candidate, iso3) in &self.names {
            let score = jaro_winkler::similarity(query.chars(), candidate.chars());
            match best {
                Some((top, top_iso3)) if score == top && top_iso3 != iso3 => tied = true,
                Some((top, _)) if score <= top => {}
                _ => {
                    best = Some((score, iso3.as_str()));
                    tied = false;
                }
            }
        }

        let (score, iso3) = best?;
        debug!(%name, %iso3, score, tied, "closest country name");
        (score >= FUZZY_THRESHOLD && !tied).then(|| iso3.to_string())
    }
}

/// Lowercase, accents folded, alphanumerics only, single spaces.
fn normalise(name: &str) -> String {
    let mut folded = String::with_capacity(name.len());
    for c in name.to_lowercase().chars() {
        match fold_accent(c) {
            Some(s) => folded.push_str(s),
            None => folded.push(c),
        }
    }
    folded
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
