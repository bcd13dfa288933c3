//! Area resolution from request parameters.
//!
//! Each supported input shape is an `AreaResolver`. They are evaluated in
//! priority order and the first one that applies wins, so a new input shape
//! is one more entry in `RESOLVERS` rather than another nested branch.

use h3o::Resolution;
use tracing::{debug, warn};

use super::{
    map_cells_to_tier, parse_cell, parse_cell_list, select_for_center, select_for_point,
    ResolvedArea, SpatialConfig, SpatialError, Tier,
};

/// Spatial parameters shared by `/feed` and `/search`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AreaRequest {
    /// Comma-separated cell tokens
    pub h3: Option<String>,
    /// Tier name or resolution number for `h3`
    pub resolution: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub radius_km: Option<f64>,
    /// Previously resolved center cell
    pub center: Option<String>,
    /// Retired resolution-6 cell list
    pub h3r6: Option<String>,
    /// Retired resolution-8 cell list
    pub h3r8: Option<String>,
}

fn has_text(value: &Option<String>) -> bool {
    value
        .as_deref()
        .map(|v| v.split(',').any(|t| !t.trim().is_empty()))
        .unwrap_or(false)
}

trait AreaResolver: Sync {
    fn name(&self) -> &'static str;
    fn is_legacy(&self) -> bool {
        false
    }
    fn applies(&self, request: &AreaRequest) -> bool;
    fn resolve(
        &self,
        request: &AreaRequest,
        config: &SpatialConfig,
    ) -> Result<ResolvedArea, SpatialError>;
}

struct CellListResolver;

impl AreaResolver for CellListResolver {
    fn name(&self) -> &'static str {
        "h3"
    }

    fn applies(&self, request: &AreaRequest) -> bool {
        has_text(&request.h3)
    }

    fn resolve(
        &self,
        request: &AreaRequest,
        config: &SpatialConfig,
    ) -> Result<ResolvedArea, SpatialError> {
        let cells = parse_cell_list(request.h3.as_deref().unwrap_or_default())?;
        if cells.len() > config.max_input_cells {
            return Err(SpatialError::TooManyCells {
                count: cells.len(),
                limit: config.max_input_cells,
            });
        }

        let tier = match request.resolution.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => {
                Tier::from_param(raw).ok_or_else(|| SpatialError::UnknownTier(raw.to_string()))?
            }
            _ => cells
                .first()
                .map(|cell| Tier::nearest(cell.resolution()))
                .ok_or(SpatialError::NoLocation)?,
        };

        Ok(ResolvedArea {
            tier,
            center: None,
            cells: map_cells_to_tier(&cells, tier, config)?,
            source: self.name(),
        })
    }
}

struct PointResolver;

impl AreaResolver for PointResolver {
    fn name(&self) -> &'static str {
        "point"
    }

    fn applies(&self, request: &AreaRequest) -> bool {
        request.lat.is_some() && request.lng.is_some()
    }

    fn resolve(
        &self,
        request: &AreaRequest,
        config: &SpatialConfig,
    ) -> Result<ResolvedArea, SpatialError> {
        let (lat, lng) = match (request.lat, request.lng) {
            (Some(lat), Some(lng)) => (lat, lng),
            _ => return Err(SpatialError::NoLocation),
        };
        let radius = request.radius_km.unwrap_or(config.default_radius_km);
        select_for_point(lat, lng, radius, config)
    }
}

struct CenterCellResolver;

impl AreaResolver for CenterCellResolver {
    fn name(&self) -> &'static str {
        "center"
    }

    fn applies(&self, request: &AreaRequest) -> bool {
        has_text(&request.center)
    }

    fn resolve(
        &self,
        request: &AreaRequest,
        config: &SpatialConfig,
    ) -> Result<ResolvedArea, SpatialError> {
        let center = parse_cell(request.center.as_deref().unwrap_or_default())?;
        let radius = request.radius_km.unwrap_or(config.default_radius_km);
        select_for_center(center, radius, config)
    }
}

/// Cell lists computed by older clients at a tier that is no longer indexed.
struct LegacyCellListResolver {
    name: &'static str,
    retired: Resolution,
    select: fn(&AreaRequest) -> Option<&str>,
}

impl AreaResolver for LegacyCellListResolver {
    fn name(&self) -> &'static str {
        self.name
    }

    fn is_legacy(&self) -> bool {
        true
    }

    fn applies(&self, request: &AreaRequest) -> bool {
        (self.select)(request)
            .map(|raw| raw.split(',').any(|t| !t.trim().is_empty()))
            .unwrap_or(false)
    }

    fn resolve(
        &self,
        request: &AreaRequest,
        config: &SpatialConfig,
    ) -> Result<ResolvedArea, SpatialError> {
        let cells = parse_cell_list((self.select)(request).unwrap_or_default())?;
        if cells.len() > config.max_input_cells {
            return Err(SpatialError::TooManyCells {
                count: cells.len(),
                limit: config.max_input_cells,
            });
        }

        let tier = Tier::nearest(self.retired);
        debug!(
            "Mapping {} legacy cells from r{} onto {}",
            cells.len(),
            u8::from(self.retired),
            tier
        );

        Ok(ResolvedArea {
            tier,
            center: None,
            cells: map_cells_to_tier(&cells, tier, config)?,
            source: self.name,
        })
    }
}

fn legacy_r6(request: &AreaRequest) -> Option<&str> {
    request.h3r6.as_deref()
}

fn legacy_r8(request: &AreaRequest) -> Option<&str> {
    request.h3r8.as_deref()
}

static RESOLVERS: [&dyn AreaResolver; 5] = [
    &CellListResolver,
    &PointResolver,
    &CenterCellResolver,
    &LegacyCellListResolver {
        name: "h3r6",
        retired: Resolution::Six,
        select: legacy_r6,
    },
    &LegacyCellListResolver {
        name: "h3r8",
        retired: Resolution::Eight,
        select: legacy_r8,
    },
];

/// Legacy parameters present on `request` that lose to a new-style one.
pub fn shadowed_legacy(request: &AreaRequest) -> Vec<&'static str> {
    let Some(position) = RESOLVERS.iter().position(|r| r.applies(request)) else {
        return Vec::new();
    };
    if RESOLVERS[position].is_legacy() {
        return Vec::new();
    }
    RESOLVERS[position + 1..]
        .iter()
        .filter(|r| r.is_legacy() && r.applies(request))
        .map(|r| r.name())
        .collect()
}

/// Resolve the request's area with the first applicable resolver.
///
/// Returns `Ok(None)` when no spatial parameter was supplied at all, and
/// `Err(NoLocation)` when parameters were supplied but resolved to no cells.
pub fn resolve_area(
    request: &AreaRequest,
    config: &SpatialConfig,
) -> Result<Option<ResolvedArea>, SpatialError> {
    let Some(position) = RESOLVERS.iter().position(|r| r.applies(request)) else {
        return Ok(None);
    };
    let winner = RESOLVERS[position];

    let shadowed = shadowed_legacy(request);
    if !shadowed.is_empty() {
        warn!(
            resolver = winner.name(),
            ignored = ?shadowed,
            "Legacy spatial parameters ignored; new-style parameters take precedence"
        );
    }

    let area = winner.resolve(request, config)?;
    if area.is_empty() {
        return Err(SpatialError::NoLocation);
    }

    debug!(
        source = area.source,
        tier = %area.tier,
        cells = area.len(),
        "Resolved query area"
    );
    Ok(Some(area))
}
