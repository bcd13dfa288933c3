use h3o::Resolution;
use std::fmt;

/// Indexed tiers of the H3 hierarchy, ordered coarse to fine.
///
/// Every post stores one cell token per tier, so a query issued at any tier
/// can be answered from the same document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tier {
    Metro,
    District,
    Neighborhood,
}

impl Tier {
    pub const COARSE_TO_FINE: [Tier; 3] = [Tier::Metro, Tier::District, Tier::Neighborhood];
    pub const FINE_TO_COARSE: [Tier; 3] = [Tier::Neighborhood, Tier::District, Tier::Metro];

    pub fn resolution(self) -> Resolution {
        match self {
            Tier::Metro => Resolution::Five,
            Tier::District => Resolution::Seven,
            Tier::Neighborhood => Resolution::Nine,
        }
    }

    pub fn resolution_number(self) -> u8 {
        u8::from(self.resolution())
    }

    /// Document field holding this tier's cell token.
    pub fn field(self) -> &'static str {
        match self {
            Tier::Metro => "r5",
            Tier::District => "r7",
            Tier::Neighborhood => "r9",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Tier::Metro => "metro",
            Tier::District => "district",
            Tier::Neighborhood => "neighborhood",
        }
    }

    /// Average hexagon edge length in kilometres.
    pub fn edge_km(self) -> f64 {
        match self {
            Tier::Metro => 8.544_408,
            Tier::District => 1.220_630,
            Tier::Neighborhood => 0.174_375,
        }
    }

    /// Distance between neighbouring cell centroids.
    pub fn cell_spacing_km(self) -> f64 {
        self.edge_km() * 3f64.sqrt()
    }

    /// Accepts a tier name or its H3 resolution number.
    pub fn from_param(raw: &str) -> Option<Tier> {
        let raw = raw.trim();
        Tier::COARSE_TO_FINE.into_iter().find(|tier| {
            tier.name().eq_ignore_ascii_case(raw)
                || tier.field().eq_ignore_ascii_case(raw)
                || raw.parse::<u8>().ok() == Some(tier.resolution_number())
        })
    }

    /// Nearest indexed tier for an arbitrary resolution; ties go to the
    /// coarser tier because a parent covers its children exactly.
    pub fn nearest(resolution: Resolution) -> Tier {
        let target = i16::from(u8::from(resolution));
        let mut best = Tier::Metro;
        let mut best_distance = i16::MAX;
        for tier in Tier::COARSE_TO_FINE {
            let distance = (i16::from(tier.resolution_number()) - target).abs();
            if distance < best_distance {
                best = tier;
                best_distance = distance;
            }
        }
        best
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(r{})", self.name(), self.resolution_number())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiers_are_an_order_of_magnitude_apart() {
        let edges: Vec<f64> = Tier::COARSE_TO_FINE.iter().map(|t| t.edge_km()).collect();
        assert!(edges[0] / edges[1] > 5.0);
        assert!(edges[1] / edges[2] > 5.0);
    }

    #[test]
    fn test_from_param_accepts_names_and_numbers() {
        assert_eq!(Tier::from_param("metro"), Some(Tier::Metro));
        assert_eq!(Tier::from_param("District"), Some(Tier::District));
        assert_eq!(Tier::from_param("9"), Some(Tier::Neighborhood));
        assert_eq!(Tier::from_param("r7"), Some(Tier::District));
        assert_eq!(Tier::from_param("6"), None);
        assert_eq!(Tier::from_param("block"), None);
    }

    #[test]
    fn test_nearest_breaks_ties_toward_coarser() {
        assert_eq!(Tier::nearest(Resolution::Six), Tier::Metro);
        assert_eq!(Tier::nearest(Resolution::Eight), Tier::District);
        assert_eq!(Tier::nearest(Resolution::Three), Tier::Metro);
        assert_eq!(Tier::nearest(Resolution::Twelve), Tier::Neighborhood);
        assert_eq!(Tier::nearest(Resolution::Seven), Tier::District);
    }
}
