//! Scripted sessions replayed against in-memory collaborators.
//!
//! A scenario is a RON file:
//!
//! ```ron
//! (
//!     location: "#?map=12.00/51.5074/-0.1278",
//!     viewport: (zoom: 3.0, center: (lat: 0.0, lon: 0.0)),
//!     steps: [Pan(lat: 51.6, lon: -0.1), Wait(1000), Back],
//! )
//! ```

use map_hash::{
    AddressableLocation, InvalidZoomRange, LatLon, MapViewport, MemoryLocation, Scheduler,
    SyncConfig, Viewport, ViewportLocationSync, ViewportState, VirtualClock, checked_zoom_range,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when loading a scenario file.
#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error("failed to read scenario {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse scenario {path}: {source}")]
    Parse {
        path: PathBuf,
        source: ron::de::SpannedError,
    },
    #[error("scenario {path}: {source}")]
    InvalidZoomRange {
        path: PathBuf,
        source: InvalidZoomRange,
    },
}

/// One user or browser action.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub enum Step {
    /// Drag the map to a new center
    Pan { lat: f64, lon: f64 },
    /// Multiply the zoom level
    Zoom(f64),
    /// Jump straight to a view
    SetView(ViewportState),
    /// Follow a link (pushes a history entry)
    Navigate(String),
    Back,
    Forward,
    /// Let the given number of milliseconds pass
    Wait(u64),
    /// Detach the synchronizer
    Unbind,
    /// Attach the synchronizer to the viewport again
    Rebind,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    /// Fragment present before the viewport is bound
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub viewport: ViewportState,
    /// Optional `(min, max)` zoom clamp for the viewport
    #[serde(default)]
    pub zoom_range: Option<(f64, f64)>,
    pub steps: Vec<Step>,
}

/// State of both sides after a step.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub label: String,
    pub elapsed: Duration,
    pub location: String,
    pub viewport: ViewportState,
    pub history_len: usize,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let text = std::fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let scenario: Self = ron::from_str(&text).map_err(|source| ScenarioError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some((min, max)) = scenario.zoom_range {
            checked_zoom_range(min, max).map_err(|source| ScenarioError::InvalidZoomRange {
                path: path.to_path_buf(),
                source,
            })?;
        }
        Ok(scenario)
    }

    /// Binds a fresh viewport to a fresh location and plays every step.
    ///
    /// The first snapshot is taken right after binding.
    pub fn replay(&self, config: SyncConfig) -> Result<(Vec<Snapshot>, bool), InvalidZoomRange> {
        let clock = Rc::new(VirtualClock::new());
        let location = Rc::new(MemoryLocation::new(&self.location));
        let mut viewport = MapViewport::new(self.viewport);
        if let Some((min, max)) = self.zoom_range {
            viewport = viewport.with_zoom_range(min, max)?;
        }
        let viewport = Rc::new(viewport);

        let sync = ViewportLocationSync::with_config(location.clone(), clock.clone(), config);
        sync.bind(Some(viewport.clone()));

        let snapshot = |label: String| Snapshot {
            label,
            elapsed: clock.now(),
            location: location.read(),
            viewport: viewport.state(),
            history_len: location.history_len(),
        };

        let mut snapshots = vec![snapshot("bind".to_string())];
        for step in &self.steps {
            log::debug!("Replaying {step:?}");
            match step {
                Step::Pan { lat, lon } => viewport.pan_to(LatLon::new(*lat, *lon)),
                Step::Zoom(factor) => viewport.zoom_by(*factor),
                Step::SetView(state) => {
                    viewport.set_zoom(state.zoom);
                    viewport.set_center(state.center);
                }
                Step::Navigate(fragment) => location.navigate(fragment),
                Step::Back => {
                    if !location.back() {
                        log::warn!("Back: already at the first history entry");
                    }
                }
                Step::Forward => {
                    if !location.forward() {
                        log::warn!("Forward: already at the last history entry");
                    }
                }
                Step::Wait(ms) => clock.advance(Duration::from_millis(*ms)),
                Step::Unbind => {
                    sync.bind(None);
                }
                Step::Rebind => {
                    sync.bind(Some(viewport.clone()));
                }
            }
            snapshots.push(snapshot(format!("{step:?}")));
        }

        Ok((snapshots, sync.had_initial_location()))
    }
}
