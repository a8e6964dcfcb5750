use std::collections::BTreeSet;

use crate::config::MatchingSettings;
use crate::entities::booking;
use crate::utils::geo::{is_within_radius, Coordinate, GeometryError};

/// Finds carpools whose bookings start and end close to a new request.
#[derive(Debug, Clone, Copy)]
pub struct ProximityMatcher {
    pub pickup_radius_km: f64,
    pub dest_radius_km: f64,
}

impl ProximityMatcher {
    pub fn from_settings(settings: &MatchingSettings) -> Self {
        Self {
            pickup_radius_km: settings.pickup_radius_km,
            dest_radius_km: settings.dest_radius_km,
        }
    }

    /// Carpool ids referenced by active bookings compatible with the
    /// requested trip, in ascending order. Both ends must be within range;
    /// a distance equal to the radius is accepted.
    pub fn candidate_carpools(
        &self,
        pickup: Coordinate,
        destination: Coordinate,
        active: &[booking::Model],
    ) -> Result<BTreeSet<i64>, GeometryError> {
        let mut candidates = BTreeSet::new();

        for b in active {
            let near_pickup = is_within_radius(b.pickup(), pickup, self.pickup_radius_km)?;
            let near_dest = is_within_radius(b.destination(), destination, self.dest_radius_km)?;

            if near_pickup && near_dest {
                candidates.insert(b.carpool_id);
            }
        }

        Ok(candidates)
    }
}

impl Default for ProximityMatcher {
    fn default() -> Self {
        Self::from_settings(&MatchingSettings::default())
    }
}
