use std::f64::consts::PI;

// WGS-84 ellipsoid
const WGS84_A: f64 = 6_378_137.0;
const WGS84_F: f64 = 1.0 / 298.257_223_563;
const WGS84_B: f64 = (1.0 - WGS84_F) * WGS84_A;

const MAX_ITERATIONS: usize = 200;
const CONVERGENCE_THRESHOLD: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("latitude {0} is outside [-90, 90]")]
    InvalidLatitude(f64),
    #[error("longitude {0} is outside [-180, 180]")]
    InvalidLongitude(f64),
    #[error("distance between {0:?} and {1:?} did not converge")]
    NonConvergent(Coordinate, Coordinate),
}

/// A point on the earth in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Result<Self, GeometryError> {
        if !lat.is_finite() || lat.abs() > 90.0 {
            return Err(GeometryError::InvalidLatitude(lat));
        }
        if !lon.is_finite() || lon.abs() > 180.0 {
            return Err(GeometryError::InvalidLongitude(lon));
        }
        Ok(Self { lat, lon })
    }

    /// Build a coordinate that was validated before it was stored.
    /// `distance_km` still rejects it if it is out of range.
    pub fn new_unchecked(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    fn validate(&self) -> Result<(), GeometryError> {
        Self::new(self.lat, self.lon).map(|_| ())
    }
}

/// Ellipsoidal distance between two coordinates using the inverse Vincenty
/// formula on WGS-84. Returns kilometers.
pub fn distance_km(a: Coordinate, b: Coordinate) -> Result<f64, GeometryError> {
    a.validate()?;
    b.validate()?;

    let l = normalize_longitude((b.lon - a.lon).to_radians());
    let u1 = ((1.0 - WGS84_F) * a.lat.to_radians().tan()).atan();
    let u2 = ((1.0 - WGS84_F) * b.lat.to_radians().tan()).atan();
    let (sin_u1, cos_u1) = u1.sin_cos();
    let (sin_u2, cos_u2) = u2.sin_cos();

    let mut lambda = l;
    let mut converged = None;

    for _ in 0..MAX_ITERATIONS {
        let (sin_lambda, cos_lambda) = lambda.sin_cos();
        let sin_sigma = ((cos_u2 * sin_lambda).powi(2)
            + (cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda).powi(2))
        .sqrt();

        // Coincident points
        if sin_sigma == 0.0 {
            return Ok(0.0);
        }

        let cos_sigma = sin_u1 * sin_u2 + cos_u1 * cos_u2 * cos_lambda;
        let sigma = sin_sigma.atan2(cos_sigma);
        let sin_alpha = cos_u1 * cos_u2 * sin_lambda / sin_sigma;
        let cos_sq_alpha = 1.0 - sin_alpha * sin_alpha;
        // Equatorial line: cos_sq_alpha is zero
        let cos_2sigma_m = if cos_sq_alpha != 0.0 {
            cos_sigma - 2.0 * sin_u1 * sin_u2 / cos_sq_alpha
        } else {
            0.0
        };

        let c = WGS84_F / 16.0 * cos_sq_alpha * (4.0 + WGS84_F * (4.0 - 3.0 * cos_sq_alpha));
        let previous = lambda;
        lambda = l
            + (1.0 - c)
                * WGS84_F
                * sin_alpha
                * (sigma
                    + c * sin_sigma
                        * (cos_2sigma_m + c * cos_sigma * (-1.0 + 2.0 * cos_2sigma_m.powi(2))));

        if lambda.abs() > PI {
            break;
        }

        if (lambda - previous).abs() < CONVERGENCE_THRESHOLD {
            converged = Some((sin_sigma, cos_sigma, sigma, cos_sq_alpha, cos_2sigma_m));
            break;
        }
    }

    let Some((sin_sigma, cos_sigma, sigma, cos_sq_alpha, cos_2sigma_m)) = converged else {
        return Err(GeometryError::NonConvergent(a, b));
    };

    let u_sq = cos_sq_alpha * (WGS84_A.powi(2) - WGS84_B.powi(2)) / WGS84_B.powi(2);
    let big_a = 1.0 + u_sq / 16384.0 * (4096.0 + u_sq * (-768.0 + u_sq * (320.0 - 175.0 * u_sq)));
    let big_b = u_sq / 1024.0 * (256.0 + u_sq * (-128.0 + u_sq * (74.0 - 47.0 * u_sq)));
    let delta_sigma = big_b
        * sin_sigma
        * (cos_2sigma_m
            + big_b / 4.0
                * (cos_sigma * (-1.0 + 2.0 * cos_2sigma_m.powi(2))
                    - big_b / 6.0
                        * cos_2sigma_m
                        * (-3.0 + 4.0 * sin_sigma.powi(2))
                        * (-3.0 + 4.0 * cos_2sigma_m.powi(2))));

    let meters = WGS84_B * big_a * (sigma - delta_sigma);
    Ok(meters / 1000.0)
}

fn normalize_longitude(radians: f64) -> f64 {
    if radians > PI {
        radians - 2.0 * PI
    } else if radians < -PI {
        radians + 2.0 * PI
    } else {
        radians
    }
}

/// Check if a point is within `max_radius_km` of another. The boundary is
/// inclusive.
pub fn is_within_radius(
    point: Coordinate,
    center: Coordinate,
    max_radius_km: f64,
) -> Result<bool, GeometryError> {
    Ok(distance_km(point, center)? <= max_radius_km)
}
