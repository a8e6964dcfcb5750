use crate::config::MatchingSettings;

/// Price of one booking: distance charge plus a salary-based subsidy term.
/// Only the requester's own trip counts; the fare is not split with the
/// other members of the carpool.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostModel {
    pub per_km_rate: f64,
    pub subsidy_rate: f64,
}

impl CostModel {
    pub fn new(per_km_rate: f64, subsidy_rate: f64) -> Self {
        Self {
            per_km_rate,
            subsidy_rate,
        }
    }

    pub fn from_settings(settings: &MatchingSettings) -> Self {
        Self::new(settings.per_km_rate, settings.subsidy_rate)
    }

    /// `distance_km` is the direct pickup to destination distance.
    pub fn cost(&self, distance_km: f64, rider_salary: i64) -> f64 {
        distance_km * self.per_km_rate + self.subsidy_rate * rider_salary as f64
    }
}

impl Default for CostModel {
    fn default() -> Self {
        Self::from_settings(&MatchingSettings::default())
    }
}
