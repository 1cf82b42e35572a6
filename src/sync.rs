//! Two-way binding between a [`Viewport`] and an [`AddressableLocation`].
//!
//! Outbound: viewport "moved" → throttled flush → encode → `replace` the
//! location, unless the text equals the last seen fragment.
//!
//! Inbound: location changed → ignore if it equals the last seen fragment
//! (our own write echoing back) → decode → apply zoom and center. A
//! fragment that does not decode is overwritten right away with the
//! encoding of the unchanged viewport.
//!
//! Both directions share one `last_seen` string; that is the whole echo
//! suppression mechanism.

use crate::ViewportState;
use crate::codec;
use crate::config::SyncConfig;
use crate::events::ListenerId;
use crate::location::{AddressableLocation, has_fragment};
use crate::scheduler::Scheduler;
use crate::throttle::Throttle;
use crate::viewport::Viewport;
use std::cell::RefCell;
use std::rc::Rc;

struct Binding {
    viewport: Rc<dyn Viewport>,
    throttle: Rc<Throttle>,
    moved_listener: ListenerId,
    location_listener: ListenerId,
    generation: u64,
}

#[derive(Default)]
struct SyncState {
    binding: Option<Binding>,
    /// Last fragment this component wrote or read.
    last_seen: Option<String>,
    had_initial_location: bool,
    generation: u64,
    /// Set while an inbound fragment is being applied to the viewport.
    applying: bool,
    moved_while_applying: bool,
}

impl SyncState {
    fn live(&self, generation: u64) -> Option<&Binding> {
        self.binding
            .as_ref()
            .filter(|binding| binding.generation == generation)
    }
}

struct Core {
    location: Rc<dyn AddressableLocation>,
    scheduler: Rc<dyn Scheduler>,
    config: SyncConfig,
    state: RefCell<SyncState>,
}

/// Keeps one viewport and the location fragment in step.
///
/// Dropping the synchronizer unbinds it.
pub struct ViewportLocationSync {
    core: Rc<Core>,
}

impl ViewportLocationSync {
    pub fn new(location: Rc<dyn AddressableLocation>, scheduler: Rc<dyn Scheduler>) -> Self {
        Self::with_config(location, scheduler, SyncConfig::default())
    }

    pub fn with_config(
        location: Rc<dyn AddressableLocation>,
        scheduler: Rc<dyn Scheduler>,
        config: SyncConfig,
    ) -> Self {
        Self {
            core: Rc::new(Core {
                location,
                scheduler,
                config,
                state: RefCell::new(SyncState::default()),
            }),
        }
    }

    /// Binds `viewport`, or unbinds with `None`.
    ///
    /// Any previous viewport is unsubscribed first. When nothing was bound
    /// before and the location already carries a fragment, the viewport is
    /// moved to it immediately and [`Self::had_initial_location`] latches.
    pub fn bind(&self, viewport: Option<Rc<dyn Viewport>>) -> &Self {
        self.core.bind(viewport);
        self
    }

    /// The currently bound viewport.
    pub fn viewport(&self) -> Option<Rc<dyn Viewport>> {
        self.core
            .state
            .borrow()
            .binding
            .as_ref()
            .map(|binding| Rc::clone(&binding.viewport))
    }

    /// Whether a fragment was present when a viewport was first bound to it.
    ///
    /// Callers use this to decide whether to fall back to a default view.
    pub fn had_initial_location(&self) -> bool {
        self.core.state.borrow().had_initial_location
    }

    pub fn config(&self) -> &SyncConfig {
        &self.core.config
    }
}

impl Drop for ViewportLocationSync {
    fn drop(&mut self) {
        self.core.unbind();
    }
}

impl std::fmt::Debug for ViewportLocationSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.core.state.borrow();
        f.debug_struct("ViewportLocationSync")
            .field("bound", &state.binding.is_some())
            .field("last_seen", &state.last_seen)
            .field("had_initial_location", &state.had_initial_location)
            .finish()
    }
}

impl Core {
    fn bind(self: &Rc<Self>, viewport: Option<Rc<dyn Viewport>>) {
        let was_bound = self.unbind();

        let Some(viewport) = viewport else {
            self.state.borrow_mut().last_seen = None;
            log::debug!("Location sync unbound");
            return;
        };

        let generation = {
            let mut state = self.state.borrow_mut();
            state.generation += 1;
            state.generation
        };

        let weak = Rc::downgrade(self);
        let throttle = Throttle::new(
            Rc::clone(&self.scheduler),
            self.config.throttle(),
            self.config.leading,
            Rc::new(move || {
                if let Some(core) = weak.upgrade() {
                    core.flush(generation);
                }
            }),
        );

        let weak = Rc::downgrade(self);
        let moved_listener = viewport.on_moved(Rc::new(move || {
            if let Some(core) = weak.upgrade() {
                core.viewport_moved(generation);
            }
        }));

        let weak = Rc::downgrade(self);
        let location_listener = self.location.subscribe(Rc::new(move || {
            if let Some(core) = weak.upgrade() {
                core.location_changed(generation);
            }
        }));

        self.state.borrow_mut().binding = Some(Binding {
            viewport,
            throttle,
            moved_listener,
            location_listener,
            generation,
        });
        log::debug!("Location sync bound (generation {generation})");

        if !was_bound && has_fragment(&self.location.read()) {
            self.state.borrow_mut().had_initial_location = true;
            self.location_changed(generation);
        }
    }

    /// Detaches the current binding, if any. Returns whether one existed.
    fn unbind(&self) -> bool {
        let Some(binding) = self.state.borrow_mut().binding.take() else {
            return false;
        };

        binding.viewport.off_moved(binding.moved_listener);
        self.location.unsubscribe(binding.location_listener);
        binding.throttle.cancel();
        true
    }

    fn viewport_moved(&self, generation: u64) {
        let throttle = {
            let mut state = self.state.borrow_mut();
            if state.applying {
                state.moved_while_applying = true;
                return;
            }
            match state.live(generation) {
                Some(binding) => Rc::clone(&binding.throttle),
                None => return,
            }
        };
        throttle.call();
    }

    /// Writes the viewport's encoding to the location unless it is already there.
    fn flush(&self, generation: u64) {
        let Some(viewport) = self
            .state
            .borrow()
            .live(generation)
            .map(|binding| Rc::clone(&binding.viewport))
        else {
            return;
        };

        let encoded = codec::encode(&viewport.state());
        {
            let mut state = self.state.borrow_mut();
            if state.last_seen.as_deref() == Some(encoded.as_str()) {
                log::trace!("Location already at {encoded}");
                return;
            }
            state.last_seen = Some(encoded.clone());
        }

        log::debug!("Replacing location with {encoded}");
        self.location.replace(&encoded);
    }

    fn location_changed(&self, generation: u64) {
        let current = self.location.read();

        let viewport = {
            let mut state = self.state.borrow_mut();
            let Some(viewport) = state
                .live(generation)
                .map(|binding| Rc::clone(&binding.viewport))
            else {
                return;
            };
            if state.last_seen.as_deref() == Some(current.as_str()) {
                log::trace!("Ignoring echo of {current}");
                return;
            }
            state.last_seen = Some(current.clone());
            viewport
        };

        let body = current.strip_prefix('#').unwrap_or(&current);
        match codec::decode(body) {
            Ok(target) => self.apply(generation, viewport.as_ref(), target),
            Err(err) => {
                log::warn!("Replacing unusable location {current:?}: {err}");
                self.flush(generation);
            }
        }
    }

    /// Moves the viewport to `target`, replaying at most one "moved" afterwards.
    fn apply(&self, generation: u64, viewport: &dyn Viewport, target: ViewportState) {
        log::debug!(
            "Moving viewport to zoom {} at {}, {}",
            target.zoom,
            target.center.lat,
            target.center.lon
        );

        {
            let mut state = self.state.borrow_mut();
            state.applying = true;
            state.moved_while_applying = false;
        }

        viewport.set_zoom(target.zoom);
        viewport.set_center(target.center);

        let moved = {
            let mut state = self.state.borrow_mut();
            state.applying = false;
            std::mem::take(&mut state.moved_while_applying)
        };
        if moved {
            self.viewport_moved(generation);
        }
    }
}
