//! The map viewport as seen by the synchronizer.

use crate::events::{Listener, ListenerId, Listeners};
use crate::{LatLon, ViewportState};
use std::cell::Cell;
use thiserror::Error;

/// A zoom range whose bounds are NaN or out of order.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
#[error("invalid zoom range {min}..={max}")]
pub struct InvalidZoomRange {
    pub min: f64,
    pub max: f64,
}

/// Accepts `(min, max)` only when both are numbers and `min <= max`.
pub fn checked_zoom_range(min: f64, max: f64) -> Result<(f64, f64), InvalidZoomRange> {
    if min <= max {
        Ok((min, max))
    } else {
        Err(InvalidZoomRange { min, max })
    }
}

/// A map view that can be read, moved programmatically and observed.
///
/// Setters take `&self`: a viewport is a shared handle that the rendering
/// side and the synchronizer both hold.
pub trait Viewport {
    fn zoom(&self) -> f64;
    fn center(&self) -> LatLon;

    /// Sets the zoom level. Setting the current value again is a no-op.
    fn set_zoom(&self, zoom: f64);

    /// Sets the center. Setting the current value again is a no-op.
    fn set_center(&self, center: LatLon);

    /// Subscribes to "moved" notifications.
    fn on_moved(&self, listener: Listener) -> ListenerId;

    fn off_moved(&self, id: ListenerId);

    fn state(&self) -> ViewportState {
        ViewportState {
            zoom: self.zoom(),
            center: self.center(),
        }
    }
}

/// In-memory viewport that notifies listeners whenever zoom or center changes.
#[derive(Debug)]
pub struct MapViewport {
    state: Cell<ViewportState>,
    zoom_range: Option<(f64, f64)>,
    moved: Listeners,
}

impl MapViewport {
    pub fn new(state: ViewportState) -> Self {
        Self {
            state: Cell::new(ViewportState::new(state.zoom, state.center)),
            zoom_range: None,
            moved: Listeners::new(),
        }
    }

    /// Restricts zoom to `[min, max]`; out-of-range zoom requests are clamped.
    pub fn with_zoom_range(mut self, min: f64, max: f64) -> Result<Self, InvalidZoomRange> {
        self.zoom_range = Some(checked_zoom_range(min, max)?);
        let state = self.state.get();
        self.state.set(ViewportState {
            zoom: self.clamp_zoom(state.zoom),
            ..state
        });
        Ok(self)
    }

    /// Moves the center, as a drag gesture would.
    pub fn pan_to(&self, center: LatLon) {
        self.set_center(center);
    }

    /// Multiplies the zoom level, as a scroll gesture would.
    pub fn zoom_by(&self, factor: f64) {
        self.set_zoom(self.zoom() * factor);
    }

    /// Number of "moved" subscribers.
    pub fn listener_count(&self) -> usize {
        self.moved.len()
    }

    fn clamp_zoom(&self, zoom: f64) -> f64 {
        match self.zoom_range {
            Some((min, max)) => zoom.clamp(min, max),
            None => zoom,
        }
    }

    fn update(&self, next: ViewportState) {
        if next == self.state.get() {
            return;
        }
        self.state.set(next);
        self.moved.emit();
    }
}

impl Default for MapViewport {
    fn default() -> Self {
        Self::new(ViewportState::default())
    }
}

impl Viewport for MapViewport {
    fn zoom(&self) -> f64 {
        self.state.get().zoom
    }

    fn center(&self) -> LatLon {
        self.state.get().center
    }

    fn set_zoom(&self, zoom: f64) {
        let zoom = self.clamp_zoom(zoom);
        self.update(ViewportState {
            zoom,
            ..self.state.get()
        });
    }

    fn set_center(&self, center: LatLon) {
        self.update(ViewportState {
            center: center.clamped(),
            ..self.state.get()
        });
    }

    fn on_moved(&self, listener: Listener) -> ListenerId {
        self.moved.add(listener)
    }

    fn off_moved(&self, id: ListenerId) {
        self.moved.remove(id);
    }
}
