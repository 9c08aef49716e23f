//! Geodesy helpers for geofence checks.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{AppError, RejectionCode};

const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// A WGS84 coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Rejects non-finite or out-of-range coordinates.
    pub fn validate(&self) -> Result<(), AppError> {
        let valid = self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude);
        if valid {
            Ok(())
        } else {
            Err(AppError::rejected(
                RejectionCode::InvalidCoordinates,
                format!(
                    "Invalid coordinates ({}, {})",
                    self.latitude, self.longitude
                ),
            ))
        }
    }

    /// Great-circle distance in metres (haversine).
    pub fn distance_m(&self, other: &GeoPoint) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlat = (other.latitude - self.latitude).to_radians();
        let dlon = (other.longitude - self.longitude).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_M * c
    }

    /// Distance after validating both ends.
    pub fn checked_distance_m(&self, other: &GeoPoint) -> Result<f64, AppError> {
        self.validate()?;
        other.validate()?;
        Ok(self.distance_m(other))
    }
}

/// Point `metres` due north of `origin`. Handy for building fixtures.
pub fn offset_north(origin: GeoPoint, metres: f64) -> GeoPoint {
    let delta = (metres / EARTH_RADIUS_M).to_degrees();
    GeoPoint::new(origin.latitude + delta, origin.longitude)
}
