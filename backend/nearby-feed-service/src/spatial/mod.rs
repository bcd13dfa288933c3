//! Spatial resolution selection over the H3 hexagonal index.
//!
//! Maps a radius hint to one indexed tier and a bounded neighbourhood of
//! cells, so the number of downstream membership queries stays flat as the
//! requested radius grows. Also maps pre-computed cell lists (including
//! lists at retired tiers) onto the tiers posts are indexed at.

pub mod resolver;
pub mod tier;

pub use resolver::{resolve_area, shadowed_legacy, AreaRequest};
pub use tier::Tier;

use h3o::{CellIndex, LatLng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use thiserror::Error;

/// Tunables for tier selection, injected from `Config`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpatialConfig {
    pub max_rings_metro: u32,
    pub max_rings_district: u32,
    pub max_rings_neighborhood: u32,
    /// Upper bound on cells accepted from (or expanded out of) a cell list
    pub max_input_cells: usize,
    /// Radius used when a point or center cell arrives without one
    pub default_radius_km: f64,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self {
            max_rings_metro: 2,
            max_rings_district: 3,
            max_rings_neighborhood: 3,
            max_input_cells: 200,
            default_radius_km: 2.0,
        }
    }
}

impl SpatialConfig {
    pub fn max_rings(&self, tier: Tier) -> u32 {
        match tier {
            Tier::Metro => self.max_rings_metro,
            Tier::District => self.max_rings_district,
            Tier::Neighborhood => self.max_rings_neighborhood,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SpatialError {
    #[error("query requires a location")]
    NoLocation,
    #[error("invalid cell token: {0}")]
    InvalidCell(String),
    #[error("invalid coordinates: lat={lat}, lng={lng}")]
    InvalidCoordinates { lat: f64, lng: f64 },
    #[error("invalid radius: {0}")]
    InvalidRadius(f64),
    #[error("unknown resolution tier: {0}")]
    UnknownTier(String),
    #[error("too many cells: {count} exceeds limit of {limit}")]
    TooManyCells { count: usize, limit: usize },
}

/// Output of the selector: one tier, an optional center and the cells to query.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedArea {
    pub tier: Tier,
    pub center: Option<CellIndex>,
    pub cells: BTreeSet<CellIndex>,
    /// Name of the resolver that produced this area, for diagnostics
    pub source: &'static str,
}

impl ResolvedArea {
    /// Cell tokens as stored in the tier's document field.
    pub fn tokens(&self) -> BTreeSet<String> {
        self.cells.iter().map(|cell| cell.to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Number of cells in a disk of `rings` rings (away from pentagons).
pub fn disk_size(rings: u32) -> usize {
    let r = rings as usize;
    3 * r * (r + 1) + 1
}

/// Pick the finest tier whose ring budget covers `radius_km`, falling back to
/// the coarsest tier clamped to its own budget.
pub fn select_tier(radius_km: f64, config: &SpatialConfig) -> Result<(Tier, u32), SpatialError> {
    if !radius_km.is_finite() || radius_km <= 0.0 {
        return Err(SpatialError::InvalidRadius(radius_km));
    }

    for tier in Tier::FINE_TO_COARSE {
        let rings = ((radius_km / tier.cell_spacing_km()).ceil() as u32).max(1);
        if rings <= config.max_rings(tier) {
            return Ok((tier, rings));
        }
    }

    Ok((Tier::Metro, config.max_rings(Tier::Metro).max(1)))
}

/// Resolve a point and radius into a tier and a disk of cells around it.
pub fn select_for_point(
    lat: f64,
    lng: f64,
    radius_km: f64,
    config: &SpatialConfig,
) -> Result<ResolvedArea, SpatialError> {
    let point = to_latlng(lat, lng)?;
    let (tier, rings) = select_tier(radius_km, config)?;
    let center = point.to_cell(tier.resolution());

    Ok(disk_area(center, tier, rings, "point"))
}

/// Resolve a previously computed center cell (at any resolution) and radius.
pub fn select_for_center(
    center: CellIndex,
    radius_km: f64,
    config: &SpatialConfig,
) -> Result<ResolvedArea, SpatialError> {
    let (tier, rings) = select_tier(radius_km, config)?;
    let center = recenter(center, tier);

    Ok(disk_area(center, tier, rings, "center"))
}

fn disk_area(center: CellIndex, tier: Tier, rings: u32, source: &'static str) -> ResolvedArea {
    let cells: BTreeSet<CellIndex> = center.grid_disk::<Vec<_>>(rings).into_iter().collect();
    ResolvedArea {
        tier,
        center: Some(center),
        cells,
        source,
    }
}

/// Move a cell to `tier`: parent when finer, center child when coarser.
fn recenter(cell: CellIndex, tier: Tier) -> CellIndex {
    let target = tier.resolution();
    let current = u8::from(cell.resolution());
    if current > u8::from(target) {
        cell.parent(target).unwrap_or(cell)
    } else if current < u8::from(target) {
        cell.center_child(target).unwrap_or(cell)
    } else {
        cell
    }
}

/// Map arbitrary-resolution cells onto `tier`. Finer cells collapse into
/// their parent; coarser cells expand into their children. The expanded set
/// is bounded by `max_input_cells`.
pub fn map_cells_to_tier(
    cells: &[CellIndex],
    tier: Tier,
    config: &SpatialConfig,
) -> Result<BTreeSet<CellIndex>, SpatialError> {
    let target = tier.resolution();
    let limit = config.max_input_cells;
    let mut mapped = BTreeSet::new();

    for cell in cells {
        let current = u8::from(cell.resolution());
        if current >= u8::from(target) {
            if let Some(parent) = cell.parent(target) {
                mapped.insert(parent);
            }
        } else {
            let count = cell.children_count(target) as usize;
            if mapped.len() + count > limit {
                return Err(SpatialError::TooManyCells {
                    count: mapped.len() + count,
                    limit,
                });
            }
            mapped.extend(cell.children(target));
        }
    }

    if mapped.len() > limit {
        return Err(SpatialError::TooManyCells {
            count: mapped.len(),
            limit,
        });
    }

    Ok(mapped)
}

/// Parse a comma-separated list of cell tokens, skipping blanks.
pub fn parse_cell_list(raw: &str) -> Result<Vec<CellIndex>, SpatialError> {
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(parse_cell)
        .collect()
}

pub fn parse_cell(token: &str) -> Result<CellIndex, SpatialError> {
    CellIndex::from_str(token.trim()).map_err(|_| SpatialError::InvalidCell(token.to_string()))
}

/// Geo tokens for every indexed tier, keyed by store field name.
pub fn geo_tokens_for_cell(cell: CellIndex) -> BTreeMap<String, String> {
    Tier::COARSE_TO_FINE
        .into_iter()
        .map(|tier| (tier.field().to_string(), recenter(cell, tier).to_string()))
        .collect()
}

/// Tokens are derived from the finest cell's ancestors so the tiers of one
/// document always nest.
pub fn geo_tokens_for_point(lat: f64, lng: f64) -> Result<BTreeMap<String, String>, SpatialError> {
    let point = to_latlng(lat, lng)?;
    Ok(geo_tokens_for_cell(
        point.to_cell(Tier::Neighborhood.resolution()),
    ))
}

fn to_latlng(lat: f64, lng: f64) -> Result<LatLng, SpatialError> {
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(SpatialError::InvalidCoordinates { lat, lng });
    }
    LatLng::new(lat, lng).map_err(|_| SpatialError::InvalidCoordinates { lat, lng })
}

#[cfg(test)]
mod tests {
    use super::*;
    use h3o::Resolution;

    // Findlay Market, Cincinnati
    const LAT: f64 = 39.1155;
    const LNG: f64 = -84.5185;

    #[test]
    fn test_small_radius_selects_fine_tier() {
        let cfg = SpatialConfig::default();
        let (tier, rings) = select_tier(0.5, &cfg).unwrap();
        assert_eq!(tier, Tier::Neighborhood);
        assert_eq!(rings, 2);

        let (tier, rings) = select_tier(0.1, &cfg).unwrap();
        assert_eq!(tier, Tier::Neighborhood);
        assert_eq!(rings, 1);
    }

    #[test]
    fn test_medium_radius_selects_district() {
        let cfg = SpatialConfig::default();
        let (tier, rings) = select_tier(5.0, &cfg).unwrap();
        assert_eq!(tier, Tier::District);
        assert_eq!(rings, 3);
    }

    #[test]
    fn test_large_radius_clamps_to_coarsest() {
        let cfg = SpatialConfig::default();
        assert_eq!(select_tier(20.0, &cfg).unwrap(), (Tier::Metro, 2));
        assert_eq!(select_tier(5_000.0, &cfg).unwrap(), (Tier::Metro, 2));
    }

    #[test]
    fn test_invalid_radius_rejected() {
        let cfg = SpatialConfig::default();
        assert!(matches!(
            select_tier(0.0, &cfg),
            Err(SpatialError::InvalidRadius(_))
        ));
        assert!(select_tier(f64::NAN, &cfg).is_err());
    }

    #[test]
    fn test_candidate_cells_stay_bounded_across_radii() {
        let cfg = SpatialConfig::default();
        let bound = disk_size(3);
        for radius in [0.05, 0.3, 0.9, 2.0, 6.0, 15.0, 40.0, 300.0] {
            let area = select_for_point(LAT, LNG, radius, &cfg).unwrap();
            assert!(
                area.len() <= bound,
                "radius {} produced {} cells",
                radius,
                area.len()
            );
            assert!(area.cells.contains(&area.center.unwrap()));
            assert!(area
                .cells
                .iter()
                .all(|c| c.resolution() == area.tier.resolution()));
        }
    }

    #[test]
    fn test_center_cell_is_moved_to_selected_tier() {
        let cfg = SpatialConfig::default();
        let fine = LatLng::new(LAT, LNG).unwrap().to_cell(Resolution::Eleven);
        let area = select_for_center(fine, 5.0, &cfg).unwrap();
        assert_eq!(area.tier, Tier::District);
        assert_eq!(
            area.center.unwrap(),
            fine.parent(Resolution::Seven).unwrap()
        );
        assert_eq!(area.len(), disk_size(3));
    }

    #[test]
    fn test_map_finer_cells_to_parents() {
        let cfg = SpatialConfig::default();
        let r8 = LatLng::new(LAT, LNG).unwrap().to_cell(Resolution::Eight);
        let siblings: Vec<CellIndex> = r8.grid_disk(1);
        let mapped = map_cells_to_tier(&siblings, Tier::District, &cfg).unwrap();
        assert!(!mapped.is_empty());
        assert!(mapped.len() <= siblings.len());
        assert!(mapped.contains(&r8.parent(Resolution::Seven).unwrap()));
    }

    #[test]
    fn test_map_coarser_cells_to_children_is_bounded() {
        let cfg = SpatialConfig {
            max_input_cells: 10,
            ..Default::default()
        };
        let r5 = LatLng::new(LAT, LNG).unwrap().to_cell(Resolution::Five);
        let err = map_cells_to_tier(&[r5], Tier::Neighborhood, &cfg).unwrap_err();
        assert!(matches!(err, SpatialError::TooManyCells { .. }));

        let r6 = LatLng::new(LAT, LNG).unwrap().to_cell(Resolution::Six);
        let mapped = map_cells_to_tier(&[r6], Tier::District, &SpatialConfig::default()).unwrap();
        assert_eq!(mapped.len(), 7);
    }

    #[test]
    fn test_parse_cell_list() {
        let cell = LatLng::new(LAT, LNG).unwrap().to_cell(Resolution::Seven);
        let raw = format!(" {} ,,{}", cell, cell);
        assert_eq!(parse_cell_list(&raw).unwrap(), vec![cell, cell]);
        assert!(matches!(
            parse_cell_list("not-a-cell"),
            Err(SpatialError::InvalidCell(_))
        ));
        assert!(parse_cell_list(" , ").unwrap().is_empty());
    }

    #[test]
    fn test_geo_tokens_cover_every_tier() {
        let tokens = geo_tokens_for_point(LAT, LNG).unwrap();
        assert_eq!(tokens.len(), 3);
        let r9 = parse_cell(&tokens["r9"]).unwrap();
        assert_eq!(
            tokens["r5"],
            r9.parent(Resolution::Five).unwrap().to_string()
        );

        let from_cell = geo_tokens_for_cell(r9);
        assert_eq!(from_cell, tokens);
        assert!(geo_tokens_for_point(91.0, 0.0).is_err());
    }
}
