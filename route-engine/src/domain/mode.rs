//! Transport modes and their per-mode characteristics.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A transport mode.
///
/// The set is closed: every mode-dependent quantity (speed, emissions,
/// whether travel time comes from a schedule) lives in [`ModeProfile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Walk,
    Bike,
    Bus,
    Train,
    Subway,
    Tram,
    Ferry,
    Rideshare,
}

/// Static characteristics of a mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeProfile {
    /// Travel speed for unscheduled modes, in meters per second.
    /// `None` for modes whose durations come from a timetable.
    pub speed_mps: Option<f64>,

    /// Emissions per passenger-kilometer, in grams CO2e.
    pub emissions_g_per_km: f64,
}

impl ModeProfile {
    /// True if travel time is looked up in a schedule rather than derived
    /// from distance.
    pub fn is_scheduled(&self) -> bool {
        self.speed_mps.is_none()
    }
}

/// Indexed by `Mode as usize`.
const PROFILES: [ModeProfile; 8] = [
    // Walk
    ModeProfile {
        speed_mps: Some(1.4),
        emissions_g_per_km: 0.0,
    },
    // Bike
    ModeProfile {
        speed_mps: Some(4.2),
        emissions_g_per_km: 0.0,
    },
    // Bus
    ModeProfile {
        speed_mps: None,
        emissions_g_per_km: 89.0,
    },
    // Train
    ModeProfile {
        speed_mps: None,
        emissions_g_per_km: 35.0,
    },
    // Subway
    ModeProfile {
        speed_mps: None,
        emissions_g_per_km: 28.0,
    },
    // Tram
    ModeProfile {
        speed_mps: None,
        emissions_g_per_km: 29.0,
    },
    // Ferry
    ModeProfile {
        speed_mps: None,
        emissions_g_per_km: 120.0,
    },
    // Rideshare
    ModeProfile {
        speed_mps: Some(8.3),
        emissions_g_per_km: 170.0,
    },
];

impl Mode {
    pub const ALL: [Mode; 8] = [
        Mode::Walk,
        Mode::Bike,
        Mode::Bus,
        Mode::Train,
        Mode::Subway,
        Mode::Tram,
        Mode::Ferry,
        Mode::Rideshare,
    ];

    pub fn profile(self) -> &'static ModeProfile {
        &PROFILES[self as usize]
    }

    pub fn is_scheduled(self) -> bool {
        self.profile().is_scheduled()
    }

    /// Travel time in seconds over `distance_m` for unscheduled modes.
    pub fn street_duration_secs(self, distance_m: f64) -> Option<i64> {
        self.profile()
            .speed_mps
            .map(|speed| (distance_m / speed).ceil() as i64)
    }

    /// Emissions in grams for travelling `distance_m`.
    pub fn emissions_g(self, distance_m: f64) -> f64 {
        self.profile().emissions_g_per_km * distance_m / 1000.0
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Walk => "walk",
            Mode::Bike => "bike",
            Mode::Bus => "bus",
            Mode::Train => "train",
            Mode::Subway => "subway",
            Mode::Tram => "tram",
            Mode::Ferry => "ferry",
            Mode::Rideshare => "rideshare",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
