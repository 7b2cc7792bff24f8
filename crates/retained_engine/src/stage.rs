//! Host loop
//!
//! A [`Stage`] wires a scene to both schedulers and the input dispatcher and
//! drives them from the thread that owns the graphics device.

use std::sync::Arc;
use std::thread;

use thiserror::Error;

use crate::config::ConfigError;
use crate::core::config::ToolkitConfig;
use crate::events::{InputDispatcher, InputEvent};
use crate::foundation::logging;
use crate::foundation::time::{Stopwatch, SystemClock, TimeSource, Timer};
use crate::render::camera::Viewport;
use crate::render::device::GraphicsDevice;
use crate::scene::{ObjectRegistry, Scene};
use crate::scheduler::{FrameScheduler, SchedulerError, UpdateScheduler};

/// Stage errors
#[derive(Error, Debug)]
pub enum StageError {
    /// The configuration was rejected
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A scheduler could not be started
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),
}

/// Scene, schedulers and input dispatch driven as one unit
pub struct Stage {
    config: ToolkitConfig,
    scene: Arc<Scene>,
    input: Arc<InputDispatcher>,
    frames: FrameScheduler,
    updates: UpdateScheduler,
    timer: Timer,
}

impl Stage {
    /// Create a stage ticking the simulation from the system clock
    pub fn new(config: ToolkitConfig) -> Result<Self, StageError> {
        Self::with_clock(config, Arc::new(SystemClock::new()))
    }

    /// Create a stage ticking the simulation from `clock`
    pub fn with_clock(
        config: ToolkitConfig,
        clock: Arc<dyn TimeSource>,
    ) -> Result<Self, StageError> {
        config.validate()?;
        logging::init_with_level(&config.log_level);
        log::info!("Initializing stage...");

        let registry =
            ObjectRegistry::with_housekeeping_interval(config.update.housekeeping_interval());
        let scene = Arc::new(Scene::new(registry.clone()));
        let input = Arc::new(InputDispatcher::new());
        registry.register_event_source(input.clone());

        let frames = FrameScheduler::new(Arc::clone(&scene), config.frame.clone());
        let updates = UpdateScheduler::with_clock(registry, &config.update, clock)?;

        log::info!(
            "Stage ready: {} fps target, {} scene / {} interface sub-passes, {} update worker(s)",
            config.frame.target_fps,
            config.frame.scene_passes,
            config.frame.interface_passes,
            config.update.workers
        );

        Ok(Self {
            config,
            scene,
            input,
            frames,
            updates,
            timer: Timer::new(),
        })
    }

    /// Configuration the stage was built from
    pub fn config(&self) -> &ToolkitConfig {
        &self.config
    }

    /// The scene being drawn
    pub fn scene(&self) -> &Arc<Scene> {
        &self.scene
    }

    /// Shortcut for the scene's registry
    pub fn registry(&self) -> &ObjectRegistry {
        self.scene.registry()
    }

    /// Input dispatcher bound to every registered listener
    pub fn input(&self) -> &Arc<InputDispatcher> {
        &self.input
    }

    /// The frame scheduler
    pub fn frame_scheduler(&self) -> &FrameScheduler {
        &self.frames
    }

    /// The update scheduler
    pub fn update_scheduler(&self) -> &UpdateScheduler {
        &self.updates
    }

    /// Frame timer, advanced once per [`Stage::frame`]
    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    /// Route an input event; returns whether a listener consumed it
    ///
    /// Resizes are applied to the scene viewport before listeners see them.
    pub fn handle_input(&self, event: &InputEvent) -> bool {
        if let InputEvent::Resized { width, height } = *event {
            log::debug!("Surface resized to {}x{}", width, height);
            self.scene.set_viewport(Viewport::sized(width, height));
        }
        self.input.dispatch(event)
    }

    /// Render one frame and present it
    ///
    /// When the frame was rendered the buffers are swapped and the update
    /// scheduler is told a frame was displayed.
    pub fn frame(&mut self, device: &mut dyn GraphicsDevice) -> bool {
        let rendered = self.frames.render(device);
        if rendered {
            device.swap_buffers();
            self.updates.frame_displayed();
        }
        self.timer.update();
        rendered
    }

    /// Render frames paced to the target frame rate until `keep_running`
    /// returns false
    pub fn run(&mut self, device: &mut dyn GraphicsDevice, mut keep_running: impl FnMut() -> bool) {
        let period = self.config.frame.frame_period();
        log::info!("Starting frame loop...");

        while keep_running() {
            let stopwatch = Stopwatch::start_new();
            self.frame(device);
            if let Some(remaining) = period.checked_sub(stopwatch.elapsed()) {
                thread::sleep(remaining);
            }
        }

        log::info!(
            "Frame loop stopped after {} frames ({:.1} fps average)",
            self.timer.frame_count(),
            self.timer.average_fps()
        );
    }

    /// Wait for the in-flight update and tear the stage down
    ///
    /// Returns the number of disposables that were removed from the scene
    /// but never disposed; each one is logged as the registry is dropped.
    pub fn shutdown(self) -> usize {
        log::info!("Shutting down stage...");
        self.updates.wait_idle();
        let leaks = self.registry().leaks().len();
        if leaks == 0 {
            log::info!("Stage shut down cleanly");
        }
        leaks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{FrameConfig, UpdateConfig};
    use crate::events::InputListener;
    use crate::foundation::time::ManualClock;
    use crate::render::camera::{BasicCamera, Camera};
    use crate::render::pass::DrawingPass;
    use crate::render::HeadlessDevice;
    use crate::scene::{Actor, Capability, Disposable, SceneObject};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn stage() -> (Stage, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let stage = Stage::with_clock(ToolkitConfig::default(), clock.clone()).unwrap();
        (stage, clock)
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = ToolkitConfig::default().with_update(UpdateConfig::new().with_workers(0));
        assert!(matches!(Stage::new(config), Err(StageError::Config(_))));
    }

    #[test]
    fn test_frame_presents_and_notifies_updates() {
        let (mut stage, _clock) = stage();
        let mut device = HeadlessDevice::new(8, 8);

        assert!(stage.frame(&mut device));
        stage.update_scheduler().wait_idle();
        assert_eq!(device.swaps(), 1);
        assert_eq!(stage.timer().frame_count(), 1);
        assert_eq!(stage.frame_scheduler().frames_rendered(), 1);
    }

    #[test]
    fn test_resize_reaches_cameras() {
        let (stage, _clock) = stage();
        let camera = Arc::new(BasicCamera::new("main", DrawingPass::VISUAL));
        stage.scene().add(camera.clone()).unwrap();

        stage.handle_input(&InputEvent::Resized { width: 32, height: 24 });
        assert_eq!(stage.scene().viewport(), Viewport::sized(32, 24));
        assert_eq!(camera.viewport(), Viewport::sized(32, 24));
    }

    #[test]
    fn test_registered_listener_receives_input() {
        #[derive(Default)]
        struct Keys {
            pressed: AtomicUsize,
        }

        impl InputListener for Keys {
            fn on_input(&self, event: &InputEvent) -> bool {
                if matches!(event, InputEvent::KeyPressed(_)) {
                    self.pressed.fetch_add(1, Ordering::SeqCst);
                    return true;
                }
                false
            }
        }

        impl SceneObject for Keys {
            fn capabilities(self: Arc<Self>) -> Vec<Capability> {
                vec![Capability::InputListener(self)]
            }
        }

        let (stage, _clock) = stage();
        let keys = Arc::new(Keys::default());
        stage.scene().add(keys.clone()).unwrap();

        assert!(stage.handle_input(&InputEvent::KeyPressed(32)));
        assert!(!stage.handle_input(&InputEvent::PointerMoved { x: 1.0, y: 2.0 }));
        assert_eq!(keys.pressed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_run_stops_when_asked() {
        let clock = Arc::new(ManualClock::new());
        let config = ToolkitConfig::default().with_frame(FrameConfig::new().with_target_fps(1000));
        let mut stage = Stage::with_clock(config, clock).unwrap();
        let mut device = HeadlessDevice::new(8, 8);

        let mut remaining = 3;
        stage.run(&mut device, || {
            remaining -= 1;
            remaining >= 0
        });
        assert_eq!(stage.timer().frame_count(), 3);
    }

    #[test]
    fn test_shutdown_counts_leaks() {
        #[derive(Default)]
        struct Mesh {
            disposed: AtomicBool,
        }

        impl Disposable for Mesh {
            fn is_disposed(&self) -> bool {
                self.disposed.load(Ordering::SeqCst)
            }

            fn dispose(&self) {
                self.disposed.store(true, Ordering::SeqCst);
            }
        }

        impl SceneObject for Mesh {
            fn capabilities(self: Arc<Self>) -> Vec<Capability> {
                vec![Capability::Disposable(self)]
            }
        }

        let (stage, _clock) = stage();
        let kept = Arc::new(Mesh::default());
        let leaked = Arc::new(Mesh::default());
        let actor = Arc::new(
            Actor::new("ship").with_support(kept.clone()).with_support(leaked.clone()),
        );
        stage.scene().add_actor(&actor).unwrap();
        stage.scene().remove_actor(&actor);
        kept.dispose();

        assert_eq!(stage.shutdown(), 1);
    }
}
