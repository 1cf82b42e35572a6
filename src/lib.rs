//! Keeps a map viewport (zoom + center) in sync with a shareable location
//! fragment such as `#?map=16.00/51.5074/-0.1278`.
//!
//! The viewport and the location are collaborators behind the [`Viewport`]
//! and [`AddressableLocation`] traits; [`ViewportLocationSync`] wires them
//! together, throttling outbound writes and ignoring its own echoes.

use serde::{Deserialize, Serialize};

pub mod codec;
pub mod config;
pub mod events;
pub mod location;
pub mod scheduler;
pub mod sync;
pub mod throttle;
pub mod viewport;

pub use codec::{DecodeError, decode, encode, precision_for_zoom};
pub use config::{ConfigError, SyncConfig};
pub use events::{Listener, ListenerId, Listeners};
pub use location::{AddressableLocation, MemoryLocation};
pub use scheduler::{Scheduler, TimerId, VirtualClock};
pub use sync::ViewportLocationSync;
pub use throttle::Throttle;
pub use viewport::{InvalidZoomRange, MapViewport, Viewport, checked_zoom_range};

/// Largest latitude a viewport may be centered on.
///
/// Kept strictly inside ±90° so projections never hit the poles.
pub const MAX_LATITUDE: f64 = 90.0 - 1e-8;

/// A geographic position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Returns a copy with the latitude clamped to `[-MAX_LATITUDE, MAX_LATITUDE]`.
    ///
    /// Longitude is left alone.
    pub fn clamped(self) -> Self {
        Self {
            lat: self.lat.clamp(-MAX_LATITUDE, MAX_LATITUDE),
            lon: self.lon,
        }
    }
}

/// The visible state of a map: zoom level and center.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportState {
    /// Zoom level, expected to be > 0
    pub zoom: f64,
    /// Center of the view, latitude clamped to [`MAX_LATITUDE`]
    pub center: LatLon,
}

impl ViewportState {
    pub fn new(zoom: f64, center: LatLon) -> Self {
        Self {
            zoom,
            center: center.clamped(),
        }
    }
}

impl Default for ViewportState {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            center: LatLon::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_latitude_into_open_range() {
        let c = LatLon::new(200.0, 10.0).clamped();
        assert_eq!(c.lat, MAX_LATITUDE);
        assert_eq!(c.lon, 10.0);

        let c = LatLon::new(-91.0, 500.0).clamped();
        assert_eq!(c.lat, -MAX_LATITUDE);
        assert_eq!(c.lon, 500.0);
    }

    #[test]
    fn viewport_state_new_clamps_center() {
        let state = ViewportState::new(3.0, LatLon::new(90.0, 0.0));
        assert!(state.center.lat < 90.0);
    }
}
