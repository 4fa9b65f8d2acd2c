//! Read-only queries over a fully loaded accident collection.
//!
//! Nothing here touches the pipeline machinery: load a file (or a finished
//! run's output) with [`load_accidents`] and ask questions of the slice.

use crate::accident::RoadAccident;
use crate::io::csv::{CsvFormat, read_csv_vec};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Load every accident of one delimited file.
///
/// # Errors
/// The file cannot be opened or a row does not decode.
pub fn load_accidents(
    path: impl AsRef<Path>,
    format: CsvFormat,
) -> anyhow::Result<Vec<RoadAccident>> {
    read_csv_vec(path, format)
}

pub struct AccidentQueries<'a> {
    accidents: &'a [RoadAccident],
}

impl<'a> AccidentQueries<'a> {
    #[must_use]
    pub fn new(accidents: &'a [RoadAccident]) -> Self {
        Self { accidents }
    }

    /// First accident with the given index.
    #[must_use]
    pub fn by_id(&self, id: &str) -> Option<&'a RoadAccident> {
        self.accidents.iter().find(|a| a.accident_id == id)
    }

    /// Accidents inside the box, bounds included.
    #[must_use]
    pub fn within(
        &self,
        min_longitude: f64,
        max_longitude: f64,
        min_latitude: f64,
        max_latitude: f64,
    ) -> Vec<&'a RoadAccident> {
        self.accidents
            .iter()
            .filter(|a| {
                (min_longitude..=max_longitude).contains(&a.longitude)
                    && (min_latitude..=max_latitude).contains(&a.latitude)
            })
            .collect()
    }

    #[must_use]
    pub fn count_by_road_surface(&self) -> HashMap<String, u64> {
        let mut counts = HashMap::new();
        for a in self.accidents {
            *counts.entry(a.road_surface_conditions.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// The `k` most frequent weather conditions, most frequent first.
    ///
    /// Equal counts are ordered by name so the result is deterministic.
    #[must_use]
    pub fn top_weather_conditions(&self, k: usize) -> Vec<String> {
        let mut counts: HashMap<&str, u64> = HashMap::new();
        for a in self.accidents {
            *counts.entry(a.weather_conditions.as_str()).or_insert(0) += 1;
        }
        let mut ranked: Vec<(&str, u64)> = counts.into_iter().collect();
        ranked.sort_by(|(na, ca), (nb, cb)| cb.cmp(ca).then_with(|| na.cmp(nb)));
        ranked
            .into_iter()
            .take(k)
            .map(|(name, _)| name.to_string())
            .collect()
    }

    /// Accident ids per district authority, ids in input order.
    #[must_use]
    pub fn ids_by_authority(&self) -> BTreeMap<String, Vec<String>> {
        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for a in self.accidents {
            groups
                .entry(a.district_authority.clone())
                .or_default()
                .push(a.accident_id.clone());
        }
        groups
    }
}
