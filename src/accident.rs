//! Road-safety accident records and their enrichment.
//!
//! Column names follow the DfT road-safety accident files
//! (`Accident_Index`, `Longitude`, `Police_Force`, ...). Categorical columns
//! are carried as text.

use crate::batch::Record;
use crate::enrich::Enricher;
use anyhow::{Context, bail};
use chrono::{Datelike, NaiveDate, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One decoded input row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadAccident {
    #[serde(rename = "Accident_Index")]
    pub accident_id: String,
    #[serde(rename = "Longitude")]
    pub longitude: f64,
    #[serde(rename = "Latitude")]
    pub latitude: f64,
    #[serde(rename = "Police_Force")]
    pub police_force: u32,
    /// 1 = fatal, 2 = serious, 3 = slight.
    #[serde(rename = "Accident_Severity")]
    pub accident_severity: u8,
    #[serde(rename = "Number_of_Vehicles")]
    pub number_of_vehicles: u32,
    #[serde(rename = "Number_of_Casualties")]
    pub number_of_casualties: u32,
    /// `dd/mm/yyyy`
    #[serde(rename = "Date")]
    pub date: String,
    /// `HH:MM`
    #[serde(rename = "Time")]
    pub time: String,
    #[serde(rename = "Local_Authority_(District)")]
    pub district_authority: String,
    #[serde(rename = "Light_Conditions")]
    pub light_conditions: String,
    #[serde(rename = "Weather_Conditions")]
    pub weather_conditions: String,
    #[serde(rename = "Road_Surface_Conditions")]
    pub road_surface_conditions: String,
}

impl Record for RoadAccident {
    fn record_id(&self) -> &str {
        &self.accident_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Fatal,
    Serious,
    Slight,
}

impl Severity {
    /// # Errors
    /// Codes outside `1..=3`.
    pub fn from_code(code: u8) -> anyhow::Result<Self> {
        Ok(match code {
            1 => Severity::Fatal,
            2 => Severity::Serious,
            3 => Severity::Slight,
            other => bail!("unknown accident severity code {other}"),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeOfDay {
    #[must_use]
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            6..=11 => TimeOfDay::Morning,
            12..=17 => TimeOfDay::Afternoon,
            18..=21 => TimeOfDay::Evening,
            _ => TimeOfDay::Night,
        }
    }
}

/// A [`RoadAccident`] plus derived fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadAccidentDetails {
    #[serde(rename = "Accident_Index")]
    pub accident_id: String,
    #[serde(rename = "Longitude")]
    pub longitude: f64,
    #[serde(rename = "Latitude")]
    pub latitude: f64,
    #[serde(rename = "Police_Force")]
    pub police_force: u32,
    #[serde(rename = "Accident_Severity")]
    pub accident_severity: u8,
    #[serde(rename = "Number_of_Vehicles")]
    pub number_of_vehicles: u32,
    #[serde(rename = "Number_of_Casualties")]
    pub number_of_casualties: u32,
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Time")]
    pub time: String,
    #[serde(rename = "Local_Authority_(District)")]
    pub district_authority: String,
    #[serde(rename = "Light_Conditions")]
    pub light_conditions: String,
    #[serde(rename = "Weather_Conditions")]
    pub weather_conditions: String,
    #[serde(rename = "Road_Surface_Conditions")]
    pub road_surface_conditions: String,
    #[serde(rename = "Severity")]
    pub severity: Severity,
    #[serde(rename = "Day_of_Week")]
    pub day_of_week: String,
    #[serde(rename = "Time_of_Day")]
    pub time_of_day: TimeOfDay,
    #[serde(rename = "Police_Force_Name")]
    pub police_force_name: String,
}

impl Record for RoadAccidentDetails {
    fn record_id(&self) -> &str {
        &self.accident_id
    }
}

/// Derives severity, weekday, time-of-day and police force name.
///
/// The police force table is a side input; codes it does not know map to
/// `"Unknown"`.
#[derive(Debug, Clone)]
pub struct AccidentEnricher {
    police_forces: HashMap<u32, String>,
}

impl AccidentEnricher {
    #[must_use]
    pub fn new(police_forces: HashMap<u32, String>) -> Self {
        Self { police_forces }
    }

    #[must_use]
    pub fn police_force_name(&self, code: u32) -> &str {
        self.police_forces.get(&code).map_or("Unknown", String::as_str)
    }
}

impl Default for AccidentEnricher {
    /// Table with a subset of the DfT police force codes.
    fn default() -> Self {
        let forces = [
            (1, "Metropolitan Police"),
            (3, "Cumbria"),
            (4, "Lancashire"),
            (5, "Merseyside"),
            (6, "Greater Manchester"),
            (7, "Cheshire"),
            (10, "Northumbria"),
            (11, "Durham"),
            (12, "North Yorkshire"),
            (13, "West Yorkshire"),
            (14, "South Yorkshire"),
            (16, "Humberside"),
            (17, "Cleveland"),
            (20, "West Midlands"),
            (21, "Staffordshire"),
            (22, "West Mercia"),
            (23, "Warwickshire"),
            (30, "Derbyshire"),
            (31, "Nottinghamshire"),
            (32, "Lincolnshire"),
            (33, "Leicestershire"),
            (34, "Northamptonshire"),
            (35, "Cambridgeshire"),
            (36, "Norfolk"),
            (37, "Suffolk"),
            (40, "Bedfordshire"),
            (41, "Hertfordshire"),
            (42, "Essex"),
            (43, "Thames Valley"),
            (44, "Hampshire"),
            (45, "Surrey"),
            (46, "Kent"),
            (47, "Sussex"),
            (48, "City of London"),
            (50, "Devon and Cornwall"),
            (52, "Avon and Somerset"),
            (53, "Gloucestershire"),
            (54, "Wiltshire"),
            (55, "Dorset"),
            (60, "North Wales"),
            (61, "Gwent"),
            (62, "South Wales"),
            (63, "Dyfed-Powys"),
        ];
        Self::new(
            forces
                .into_iter()
                .map(|(code, name)| (code, name.to_string()))
                .collect(),
        )
    }
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

impl Enricher for AccidentEnricher {
    type Input = RoadAccident;
    type Output = RoadAccidentDetails;

    fn enrich(&self, r: &RoadAccident) -> anyhow::Result<RoadAccidentDetails> {
        let severity = Severity::from_code(r.accident_severity)?;
        let date = NaiveDate::parse_from_str(r.date.trim(), "%d/%m/%Y")
            .with_context(|| format!("invalid date {:?}", r.date))?;
        let time = NaiveTime::parse_from_str(r.time.trim(), "%H:%M")
            .with_context(|| format!("invalid time {:?}", r.time))?;

        Ok(RoadAccidentDetails {
            accident_id: r.accident_id.clone(),
            longitude: r.longitude,
            latitude: r.latitude,
            police_force: r.police_force,
            accident_severity: r.accident_severity,
            number_of_vehicles: r.number_of_vehicles,
            number_of_casualties: r.number_of_casualties,
            date: r.date.clone(),
            time: r.time.clone(),
            district_authority: r.district_authority.clone(),
            light_conditions: r.light_conditions.clone(),
            weather_conditions: r.weather_conditions.clone(),
            road_surface_conditions: r.road_surface_conditions.clone(),
            severity,
            day_of_week: weekday_name(date.weekday()).to_string(),
            time_of_day: TimeOfDay::from_hour(time.hour()),
            police_force_name: self.police_force_name(r.police_force).to_string(),
        })
    }
}
