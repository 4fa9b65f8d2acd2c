//! Pre-built accident records for tests and demos.

use crate::accident::RoadAccident;

const WEATHER: [&str; 5] = [
    "Fine no high winds",
    "Raining no high winds",
    "Fine no high winds",
    "Snowing no high winds",
    "Fog or mist",
];
const SURFACE: [&str; 3] = ["Dry", "Wet or damp", "Dry"];
const AUTHORITY: [&str; 4] = ["Westminster", "Camden", "Leeds", "Cardiff"];

/// One well-formed accident with a predictable shape.
///
/// `n` drives every field so records differ but stay valid: severity cycles
/// 1..=3, the hour cycles 0..=23, the day cycles through January 2010.
#[must_use]
pub fn sample_accident(n: usize) -> RoadAccident {
    RoadAccident {
        accident_id: format!("2010{n:09}"),
        longitude: -0.2 + (n % 100) as f64 * 0.001,
        latitude: 51.5 + (n % 50) as f64 * 0.001,
        police_force: [1, 13, 62, 99][n % 4],
        accident_severity: (n % 3) as u8 + 1,
        number_of_vehicles: (n % 4) as u32 + 1,
        number_of_casualties: (n % 2) as u32 + 1,
        date: format!("{:02}/01/2010", n % 31 + 1),
        time: format!("{:02}:{:02}", n % 24, (n * 7) % 60),
        district_authority: AUTHORITY[n % AUTHORITY.len()].to_string(),
        light_conditions: if (6..20).contains(&(n % 24)) {
            "Daylight".to_string()
        } else {
            "Darkness - lights lit".to_string()
        },
        weather_conditions: WEATHER[n % WEATHER.len()].to_string(),
        road_surface_conditions: SURFACE[n % SURFACE.len()].to_string(),
    }
}

/// `count` accidents numbered from `start`.
#[must_use]
pub fn sample_accidents(start: usize, count: usize) -> Vec<RoadAccident> {
    (start..start + count).map(sample_accident).collect()
}
