//! Coordinate-code parsing and 1D profile extraction.
//!
//! Spatial profiles are requested with one- or two-character codes: an
//! optional stokes letter (`I`, `Q`, `U`, `V`) followed by an axis letter
//! (`x`, `y`, `z`). `z` selects the spectral subsystem. Codes with an
//! unknown axis or an out-of-range stokes are dropped silently; the
//! accepted requests keep their input order.

use ndarray::ArrayView2;

use crate::proto::{SpatialProfile, SpectralConfig, StatsType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileAxis {
    X,
    Y,
    Z,
}

/// An accepted spatial profile request.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialRequest {
    /// The code as the client sent it, echoed back in responses
    pub coordinate: String,
    pub axis: ProfileAxis,
    pub stokes: usize,
}

/// An accepted spectral profile request.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralRequest {
    pub coordinate: String,
    pub stokes: usize,
    pub stats: Vec<StatsType>,
}

/// Parses requirement strings and retains the accepted requests.
#[derive(Debug, Default)]
pub struct RegionProfiler {
    spatial: Vec<SpatialRequest>,
    spectral: Vec<SpectralRequest>,
}

impl RegionProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the spatial requirements.
    ///
    /// Returns true when every code was accepted. A missing stokes letter
    /// resolves to `default_stokes` at set time.
    pub fn set_spatial_requirements(
        &mut self,
        codes: &[String],
        n_stokes: usize,
        default_stokes: usize,
    ) -> bool {
        self.spatial.clear();
        for code in codes {
            let Some((axis, stokes)) = parse_code(code) else {
                continue;
            };
            if axis == ProfileAxis::Z {
                continue;
            }
            let stokes = match stokes {
                Some(s) if s >= n_stokes => continue,
                Some(s) => s,
                None => default_stokes,
            };
            self.spatial.push(SpatialRequest {
                coordinate: code.clone(),
                axis,
                stokes,
            });
        }
        self.spatial.len() == codes.len()
    }

    pub fn spatial_requests(&self) -> &[SpatialRequest] {
        &self.spatial
    }

    /// Replace the spectral requirements; only `z`-axis codes qualify.
    pub fn set_spectral_requirements(
        &mut self,
        configs: &[SpectralConfig],
        n_stokes: usize,
        default_stokes: usize,
    ) -> bool {
        self.spectral.clear();
        for config in configs {
            let Some((ProfileAxis::Z, stokes)) = parse_code(&config.coordinate) else {
                continue;
            };
            let stokes = match stokes {
                Some(s) if s >= n_stokes => continue,
                Some(s) => s,
                None => default_stokes,
            };
            let stats = config
                .stats_types
                .iter()
                .filter_map(|&raw| StatsType::try_from(raw).ok())
                .collect();
            self.spectral.push(SpectralRequest {
                coordinate: config.coordinate.clone(),
                stokes,
                stats,
            });
        }
        self.spectral.len() == configs.len()
    }

    pub fn spectral_requests(&self) -> &[SpectralRequest] {
        &self.spectral
    }
}

/// Parse a coordinate code into its axis and optional stokes index.
fn parse_code(code: &str) -> Option<(ProfileAxis, Option<usize>)> {
    if code.is_empty() || code.len() > 2 {
        return None;
    }
    let mut chars = code.chars();
    let (stokes_char, axis_char) = if code.len() == 2 {
        (chars.next(), chars.next()?)
    } else {
        (None, chars.next()?)
    };

    let axis = match axis_char {
        'x' => ProfileAxis::X,
        'y' => ProfileAxis::Y,
        'z' => ProfileAxis::Z,
        _ => return None,
    };
    let stokes = match stokes_char {
        None => None,
        Some('I') => Some(0),
        Some('Q') => Some(1),
        Some('U') => Some(2),
        Some('V') => Some(3),
        Some(_) => return None,
    };
    Some((axis, stokes))
}

/// Cut a 1D profile out of a plane at the cursor.
///
/// An X profile is row `cy` (length = width), a Y profile column `cx`
/// (length = height); `start` is 0 and `end` the profile length.
pub fn profile_along(
    plane: ArrayView2<'_, f32>,
    axis: ProfileAxis,
    coordinate: &str,
    cx: usize,
    cy: usize,
) -> SpatialProfile {
    let values: Vec<f32> = match axis {
        ProfileAxis::X => plane.row(cy).to_vec(),
        ProfileAxis::Y => plane.column(cx).to_vec(),
        ProfileAxis::Z => Vec::new(),
    };
    SpatialProfile {
        coordinate: coordinate.to_string(),
        start: 0,
        end: values.len() as i32,
        values,
    }
}

// =============================================================================
// Tests
// =============================================================================
