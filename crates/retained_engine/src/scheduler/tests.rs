//! Scenario tests driving the schedulers against a headless device

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;

use crate::core::config::{FrameConfig, UpdateConfig};
use crate::events::PickEvent;
use crate::foundation::math::{Point3, Vec3};
use crate::foundation::time::ManualClock;
use crate::render::{
    BasicCamera, BoundingSphere, ColorPickCamera, DeviceCapabilities, DrawTarget, DrawingPass,
    GraphicsDevice, HeadlessDevice, RayPickCamera, RenderContext, RenderError, RenderResult,
    Viewport,
};
use crate::scene::{
    Actor, Capability, Disposable, Initializable, ObjectRegistry, PickBehavior, Renderable, Scene,
    SceneObject, Uninitializable, Updatable, VertexPick, VertexShape,
};
use crate::scheduler::{FrameScheduler, UpdateOutcome, UpdateScheduler};

type DrawLog = Arc<Mutex<Vec<(String, DrawingPass, u32)>>>;

struct Recorder {
    id: String,
    log: DrawLog,
}

impl Renderable for Recorder {
    fn draw(&self, ctx: &mut RenderContext<'_>) -> RenderResult {
        self.log.lock().push((self.id.clone(), ctx.layer(), ctx.sub_pass()));
        Ok(())
    }
}

fn recorded(id: &str, log: &DrawLog) -> Actor {
    Actor::new(id).with_renderable(Arc::new(Recorder {
        id: id.to_string(),
        log: Arc::clone(log),
    }))
}

fn drawn_ids(log: &DrawLog) -> Vec<String> {
    log.lock().iter().map(|(id, _, _)| id.clone()).collect()
}

fn setup(config: FrameConfig) -> (Arc<Scene>, Arc<FrameScheduler>, HeadlessDevice) {
    let scene = Arc::new(Scene::default());
    scene.set_viewport(Viewport::sized(16, 16));
    let scheduler = Arc::new(FrameScheduler::new(Arc::clone(&scene), config));
    (scene, scheduler, HeadlessDevice::new(16, 16))
}

fn add_camera(scene: &Scene) -> Arc<BasicCamera> {
    let camera = Arc::new(BasicCamera::new("main", DrawingPass::VISUAL));
    scene.add(camera.clone()).unwrap();
    camera
}

#[derive(Default)]
struct Upload {
    slow: bool,
    initialized: AtomicBool,
}

impl Upload {
    fn slow() -> Arc<Self> {
        Arc::new(Self { slow: true, ..Self::default() })
    }

    fn fast() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn is_up(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }
}

impl Initializable for Upload {
    fn is_initialized(&self) -> bool {
        self.is_up()
    }

    fn initialize(&self, _device: &mut dyn GraphicsDevice) -> RenderResult {
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn uninitialize(&self, _device: &mut dyn GraphicsDevice) -> RenderResult {
        self.initialized.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_slow(&self) -> bool {
        self.slow
    }
}

impl SceneObject for Upload {
    fn capabilities(self: Arc<Self>) -> Vec<Capability> {
        vec![Capability::Initializable(self)]
    }
}

#[test]
fn test_reentrant_render_is_dropped() {
    struct Reentrant {
        scheduler: Mutex<Weak<FrameScheduler>>,
        device: Mutex<HeadlessDevice>,
        inner: Mutex<Option<bool>>,
    }

    impl Renderable for Reentrant {
        fn draw(&self, _ctx: &mut RenderContext<'_>) -> RenderResult {
            let scheduler = self.scheduler.lock().upgrade();
            if let Some(scheduler) = scheduler {
                let rendered = scheduler.render(&mut *self.device.lock());
                *self.inner.lock() = Some(rendered);
            }
            Ok(())
        }
    }

    let (scene, scheduler, mut device) = setup(FrameConfig::default());
    add_camera(&scene);
    let reentrant = Arc::new(Reentrant {
        scheduler: Mutex::new(Arc::downgrade(&scheduler)),
        device: Mutex::new(HeadlessDevice::new(4, 4)),
        inner: Mutex::new(None),
    });
    scene.add_actor(&Arc::new(Actor::new("loop").with_renderable(reentrant.clone()))).unwrap();

    assert!(scheduler.render(&mut device));
    assert_eq!(*reentrant.inner.lock(), Some(false));
    assert_eq!(scheduler.frames_rendered(), 1);
    assert!(!scheduler.is_drawing());
}

#[test]
fn test_slow_uploads_are_rate_limited() {
    let (scene, scheduler, mut device) = setup(FrameConfig::default().with_slow_upload_budget(2));
    add_camera(&scene);

    let slow: Vec<_> = (0..5).map(|_| Upload::slow()).collect();
    let fast: Vec<_> = (0..3).map(|_| Upload::fast()).collect();
    let mut actor = Actor::new("textured");
    for resource in slow.iter().chain(fast.iter()) {
        actor = actor.with_support(resource.clone());
    }
    scene.add_actor(&Arc::new(actor)).unwrap();

    let uploaded = |resources: &[Arc<Upload>]| resources.iter().filter(|r| r.is_up()).count();

    assert!(scheduler.render(&mut device));
    assert_eq!(uploaded(&slow), 2);
    assert_eq!(uploaded(&fast), 3);
    assert_eq!(scheduler.last_metrics().unwrap().resources_deferred, 3);
    assert!(scene.pending_repaint().is_scene());

    assert!(scheduler.render(&mut device));
    assert_eq!(uploaded(&slow), 4);
    assert!(scene.pending_repaint().is_scene());

    assert!(scheduler.render(&mut device));
    assert_eq!(uploaded(&slow), 5);
    assert!(scene.pending_repaint().is_empty());
}

#[test]
fn test_hidden_owner_releases_resources() {
    let (scene, scheduler, mut device) = setup(FrameConfig::default());
    let resource = Upload::fast();
    let actor = Arc::new(Actor::new("ship").with_support(resource.clone()));
    scene.add_actor(&actor).unwrap();

    scheduler.render(&mut device);
    assert!(resource.is_up());

    scene.set_visible(&actor, false);
    scheduler.render(&mut device);
    assert!(!resource.is_up());
    assert_eq!(scheduler.last_metrics().unwrap().resources_released, 1);
}

#[test]
fn test_teardown_dirties_visible_layer() {
    struct Retired {
        initialized: AtomicBool,
    }

    impl Uninitializable for Retired {
        fn is_initialized(&self) -> bool {
            self.initialized.load(Ordering::SeqCst)
        }

        fn uninitialize(&self, _device: &mut dyn GraphicsDevice) -> RenderResult {
            self.initialized.store(false, Ordering::SeqCst);
            Ok(())
        }
    }

    impl SceneObject for Retired {
        fn capabilities(self: Arc<Self>) -> Vec<Capability> {
            vec![Capability::Uninitializable(self)]
        }
    }

    let (scene, scheduler, mut device) = setup(FrameConfig::default());
    let retired = Arc::new(Retired { initialized: AtomicBool::new(true) });
    let hud = Arc::new(
        Actor::new("hud").with_pass(DrawingPass::INTERFACE).with_support(retired.clone()),
    );
    scene.add_actor(&hud).unwrap();

    assert!(scheduler.render(&mut device));
    assert!(!retired.is_initialized());
    assert_eq!(scene.pending_repaint(), DrawingPass::INTERFACE);

    // Already released: nothing left to invalidate
    assert!(scheduler.render(&mut device));
    assert!(scene.pending_repaint().is_empty());
}

#[test]
fn test_culled_actor_is_skipped_and_counted() {
    let (scene, scheduler, mut device) = setup(FrameConfig::default());
    add_camera(&scene);
    let log = DrawLog::default();

    let inside = recorded("inside", &log).with_culling(BoundingSphere::new(Vec3::zeros(), 0.5));
    let outside = recorded("outside", &log)
        .with_culling(BoundingSphere::new(Vec3::new(5.0, 0.0, 0.0), 1.0));
    let straddling = recorded("straddling", &log)
        .with_culling(BoundingSphere::new(Vec3::new(1.5, 0.0, 0.0), 1.0));
    for actor in [inside, outside, straddling] {
        scene.add_actor(&Arc::new(actor)).unwrap();
    }

    assert!(scheduler.render(&mut device));
    assert_eq!(drawn_ids(&log), vec!["inside", "straddling"]);
    assert_eq!(scheduler.last_metrics().unwrap().culled, 1);
}

#[test]
fn test_sub_pass_order() {
    let config = FrameConfig::default().with_scene_passes(3).with_interface_passes(2);
    let (scene, scheduler, mut device) = setup(config);
    add_camera(&scene);
    let log = DrawLog::default();

    for pass_number in 0..3 {
        let actor = recorded(&format!("scene{pass_number}"), &log).with_pass_number(pass_number);
        scene.add_actor(&Arc::new(actor)).unwrap();
    }
    for pass_number in 0..2 {
        let actor = recorded(&format!("ui{pass_number}"), &log)
            .with_pass(DrawingPass::INTERFACE)
            .with_pass_number(pass_number);
        scene.add_actor(&Arc::new(actor)).unwrap();
    }
    scene.add_actor(&Arc::new(recorded("overlay", &log).with_pass(DrawingPass::OVERLAY))).unwrap();

    assert!(scheduler.render(&mut device));
    assert_eq!(drawn_ids(&log), vec!["scene2", "scene1", "scene0", "ui0", "ui1", "overlay"]);
}

#[test]
fn test_inheriting_children_draw_with_parent() {
    let (scene, scheduler, mut device) = setup(FrameConfig::default().with_scene_passes(2));
    add_camera(&scene);
    let log = DrawLog::default();

    let panel =
        Arc::new(recorded("panel", &log).with_pass(DrawingPass::INTERFACE).with_children(true));
    panel.add_child(Arc::new(recorded("label", &log).with_pass_number(1))).unwrap();
    let group = Arc::new(Actor::new("group").with_children(false));
    group.add_child(Arc::new(recorded("back", &log).with_pass_number(1))).unwrap();
    scene.add_actor(&panel).unwrap();
    scene.add_actor(&group).unwrap();

    assert!(scheduler.render(&mut device));
    let drawn = log.lock().clone();
    assert_eq!(
        drawn,
        vec![
            ("back".to_string(), DrawingPass::SCENE, 1),
            ("panel".to_string(), DrawingPass::INTERFACE, 0),
            ("label".to_string(), DrawingPass::INTERFACE, 0),
        ]
    );
}

#[test]
fn test_state_stack_leak_is_unwound() {
    struct Leaky;

    impl Renderable for Leaky {
        fn draw(&self, ctx: &mut RenderContext<'_>) -> RenderResult {
            ctx.device().push_state();
            ctx.device().push_state();
            Ok(())
        }
    }

    let (scene, scheduler, mut device) = setup(FrameConfig::default());
    add_camera(&scene);
    scene.add_actor(&Arc::new(Actor::new("leaky").with_renderable(Arc::new(Leaky)))).unwrap();

    assert!(scheduler.render(&mut device));
    assert_eq!(device.state_depth(), 0);
    let metrics = scheduler.last_metrics().unwrap();
    assert_eq!(metrics.stack_leaks, 1);
    assert_eq!(metrics.stack_depth_end, 0);
}

#[test]
fn test_failing_hook_abandons_frame() {
    struct Failing;

    impl Renderable for Failing {
        fn draw(&self, ctx: &mut RenderContext<'_>) -> RenderResult {
            ctx.device().push_state();
            Err(RenderError::Draw("mesh missing".to_string()))
        }
    }

    let (scene, scheduler, mut device) = setup(FrameConfig::default());
    add_camera(&scene);
    let actor = Arc::new(Actor::new("broken").with_renderable(Arc::new(Failing)));
    scene.add_actor(&actor).unwrap();

    assert!(!scheduler.render(&mut device));
    assert_eq!(scheduler.frames_rendered(), 0);
    assert_eq!(scheduler.statistics().failed_frames, 1);
    assert_eq!(device.state_depth(), 0);
    assert!(!scheduler.is_drawing());

    scene.remove_actor(&actor);
    assert!(scheduler.render(&mut device));
}

#[test]
fn test_panicking_hook_is_contained() {
    struct Panicking;

    impl Renderable for Panicking {
        fn draw(&self, _ctx: &mut RenderContext<'_>) -> RenderResult {
            panic!("renderable exploded");
        }
    }

    let (scene, scheduler, mut device) = setup(FrameConfig::default());
    add_camera(&scene);
    let actor = Arc::new(Actor::new("bomb").with_renderable(Arc::new(Panicking)));
    scene.add_actor(&actor).unwrap();

    assert!(!scheduler.render(&mut device));
    assert!(!scheduler.is_drawing());

    scene.remove_actor(&actor);
    assert!(scheduler.render(&mut device));
    assert_eq!(scheduler.frames_rendered(), 1);
}

#[test]
fn test_abandoned_frame_keeps_dirty_layers() {
    struct FailsOnce {
        failed: AtomicBool,
        draws: AtomicUsize,
    }

    impl Renderable for FailsOnce {
        fn draw(&self, _ctx: &mut RenderContext<'_>) -> RenderResult {
            if !self.failed.swap(true, Ordering::SeqCst) {
                return Err(RenderError::Draw("device lost".to_string()));
            }
            self.draws.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    let (scene, scheduler, mut device) = setup(FrameConfig::default());
    add_camera(&scene);
    let flaky = Arc::new(FailsOnce {
        failed: AtomicBool::new(false),
        draws: AtomicUsize::new(0),
    });
    scene.add_actor(&Arc::new(Actor::new("flaky").with_renderable(flaky.clone()))).unwrap();

    assert!(!scheduler.render(&mut device));
    assert!(scene.pending_repaint().is_scene());

    assert!(scheduler.render(&mut device));
    assert_eq!(flaky.draws.load(Ordering::SeqCst), 1);
    assert!(scene.pending_repaint().is_empty());
}

#[test]
fn test_registered_child_draws_once_under_parent() {
    let (scene, scheduler, mut device) = setup(FrameConfig::default());
    add_camera(&scene);
    let log = DrawLog::default();

    let child = Arc::new(recorded("child", &log));
    scene.add_actor(&child).unwrap();
    let parent = Arc::new(recorded("parent", &log).with_children(false));
    parent.add_child(Arc::clone(&child)).unwrap();
    scene.add_actor(&parent).unwrap();

    let roots: Vec<_> =
        scene.registry().root_actors().iter().map(|root| root.id().to_string()).collect();
    assert_eq!(roots, vec!["parent"]);

    assert!(scheduler.render(&mut device));
    assert_eq!(drawn_ids(&log), vec!["parent", "child"]);
}

#[test]
fn test_runtime_children_repaint_their_layer() {
    let (scene, scheduler, mut device) = setup(FrameConfig::default());
    add_camera(&scene);
    let log = DrawLog::default();

    let parent = Arc::new(recorded("parent", &log).with_children(false));
    scene.add_actor(&parent).unwrap();
    assert!(scheduler.render(&mut device));
    assert!(scene.pending_repaint().is_empty());
    log.lock().clear();

    let late = Arc::new(recorded("late", &log));
    parent.add_child(Arc::clone(&late)).unwrap();
    assert!(scene.pending_repaint().is_scene());
    assert!(scheduler.render(&mut device));
    assert_eq!(drawn_ids(&log), vec!["parent", "late"]);
    log.lock().clear();

    assert!(parent.remove_child(&late));
    assert!(scene.pending_repaint().is_scene());
    assert!(scheduler.render(&mut device));
    assert_eq!(drawn_ids(&log), vec!["parent"]);
}

#[derive(Default)]
struct PickCounter {
    picked: AtomicUsize,
}

impl PickBehavior for PickCounter {
    fn pick(&self, _event: &PickEvent, _volume: &crate::render::Frustum) -> Option<f32> {
        None
    }

    fn picked(&self, _event: &PickEvent) {
        self.picked.fetch_add(1, Ordering::SeqCst);
    }
}

fn pickable_point(id: &str, position: Point3, pick: Arc<PickCounter>) -> Arc<Actor> {
    Arc::new(
        Actor::new(id)
            .with_pass(DrawingPass::SCENE_PICKING)
            .with_renderable(Arc::new(VertexShape::point(position)))
            .with_pick(pick),
    )
}

#[test]
fn test_color_pick_resolves_actor_under_pointer() {
    let (scene, scheduler, mut device) = setup(FrameConfig::default());
    let camera =
        Arc::new(ColorPickCamera::new(BasicCamera::new("picker", DrawingPass::SCENE_PICKING)));
    scene.add(camera.clone()).unwrap();

    let target_pick = Arc::new(PickCounter::default());
    scene
        .add_actor(&pickable_point("target", Point3::new(0.5, -0.5, 0.0), target_pick.clone()))
        .unwrap();
    scene.add_actor(&pickable_point("other", Point3::new(-0.5, 0.5, 0.0), Arc::default())).unwrap();
    assert!(scheduler.render(&mut device));

    // (0.5, -0.5) lands on pixel (12, 4) of a 16x16 viewport
    camera.post(PickEvent::point(12.5, 4.5));
    camera.post(PickEvent::point(1.0, 1.0));
    assert!(scheduler.render(&mut device));

    let results = camera.take_results();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].actor.as_ref().map(|actor| actor.id()), Some("target"));
    assert!(results[1].actor.is_none());
    assert_eq!(target_pick.picked.load(Ordering::SeqCst), 1);
    assert_eq!(scheduler.last_metrics().unwrap().pick_events, 2);
}

#[test]
fn test_pick_target_choice_decides_visual_repaint() {
    // Back buffer: the pick image destroys the frame, so everything repaints
    let (scene, scheduler, mut device) = setup(FrameConfig::default());
    let camera =
        Arc::new(ColorPickCamera::new(BasicCamera::new("picker", DrawingPass::SCENE_PICKING)));
    scene.add(camera.clone()).unwrap();
    scene.add_actor(&pickable_point("target", Point3::origin(), Arc::default())).unwrap();
    scheduler.render(&mut device);

    camera.post(PickEvent::point(8.0, 8.0));
    assert!(scheduler.render(&mut device));
    assert_eq!(scheduler.last_metrics().unwrap().repainted, DrawingPass::all());

    // Auxiliary buffer: only the picking layer is touched
    let caps = DeviceCapabilities { aux_buffers: 1, ..DeviceCapabilities::default() };
    let mut aux_device = HeadlessDevice::with_capabilities(16, 16, caps);
    let (scene, scheduler, _) = setup(FrameConfig::default());
    let camera =
        Arc::new(ColorPickCamera::new(BasicCamera::new("picker", DrawingPass::SCENE_PICKING)));
    scene.add(camera.clone()).unwrap();
    scene.add_actor(&pickable_point("target", Point3::origin(), Arc::default())).unwrap();
    scheduler.render(&mut aux_device);

    camera.post(PickEvent::point(8.0, 8.0));
    assert!(scheduler.render(&mut aux_device));
    assert_eq!(scheduler.last_metrics().unwrap().repainted, DrawingPass::PICKING);
    assert!(aux_device.targets_used().contains(&DrawTarget::Auxiliary(0)));
    assert_eq!(camera.take_results()[0].actor.as_ref().map(|actor| actor.id()), Some("target"));
}

#[test]
fn test_ray_pick_respects_camera_affinity() {
    let (scene, scheduler, mut device) = setup(FrameConfig::default());
    let camera = Arc::new(RayPickCamera::new(BasicCamera::new("main", DrawingPass::SCENE)));
    scene.add(camera.clone()).unwrap();

    let at = |id: &str, z: f32| {
        let vertices = vec![Point3::new(0.0, 0.0, z)];
        Actor::new(id).with_pick(Arc::new(VertexPick::new(vertices)))
    };
    scene.add_actor(&Arc::new(at("far", 0.5))).unwrap();
    scene.add_actor(&Arc::new(at("near", -0.5))).unwrap();
    scene.add_actor(&Arc::new(at("elsewhere", -0.8).with_camera("other"))).unwrap();
    scene
        .add_actor(&Arc::new(
            at("culled", 0.0).with_culling(BoundingSphere::new(Vec3::new(4.0, 0.0, 0.0), 0.5)),
        ))
        .unwrap();

    camera.post(PickEvent::area(8.0, 8.0, 4.0, 4.0));
    assert!(scheduler.render(&mut device));

    let results = camera.take_results();
    assert_eq!(results.len(), 1);
    let ids: Vec<_> = results[0].1.iter().map(|hit| hit.actor.id().to_string()).collect();
    assert_eq!(ids, vec!["near", "far"]);
    assert!(results[0].1[0].distance < results[0].1[1].distance);
}

#[derive(Default)]
struct Ticker {
    calls: AtomicUsize,
    total: Mutex<Duration>,
    panic_once: AtomicBool,
}

impl Updatable for Ticker {
    fn update(&self, delta: Duration) {
        if self.panic_once.swap(false, Ordering::SeqCst) {
            panic!("simulation diverged");
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.total.lock() += delta;
    }
}

impl SceneObject for Ticker {
    fn capabilities(self: Arc<Self>) -> Vec<Capability> {
        vec![Capability::Updatable(self)]
    }
}

fn update_setup() -> (ObjectRegistry, Arc<ManualClock>, UpdateScheduler) {
    let registry = ObjectRegistry::new();
    let clock = Arc::new(ManualClock::new());
    let updates =
        UpdateScheduler::with_clock(registry.clone(), &UpdateConfig::default(), clock.clone())
            .unwrap();
    (registry, clock, updates)
}

#[test]
fn test_tick_without_elapsed_time_is_idle() {
    let (registry, clock, updates) = update_setup();
    let ticker = Arc::new(Ticker::default());
    registry.add(ticker.clone()).unwrap();

    assert_eq!(updates.tick(), UpdateOutcome::Baseline);
    clock.advance(Duration::from_millis(16));
    assert!(matches!(updates.tick(), UpdateOutcome::Updated(metrics) if metrics.invoked == 1));
    assert_eq!(updates.tick(), UpdateOutcome::Idle);

    assert_eq!(ticker.calls.load(Ordering::SeqCst), 1);
    assert_eq!(*ticker.total.lock(), Duration::from_millis(16));
    assert_eq!(updates.ticks(), 1);
}

#[test]
fn test_update_panic_is_contained() {
    let (registry, clock, updates) = update_setup();
    let ticker = Arc::new(Ticker { panic_once: AtomicBool::new(true), ..Ticker::default() });
    registry.add(ticker.clone()).unwrap();

    updates.tick();
    clock.advance(Duration::from_millis(10));
    assert_eq!(updates.tick(), UpdateOutcome::Failed);
    assert!(!updates.is_updating());

    clock.advance(Duration::from_millis(10));
    assert!(matches!(updates.tick(), UpdateOutcome::Updated(_)));
    assert_eq!(ticker.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_frame_notifications_run_on_pool() {
    let (registry, clock, updates) = update_setup();
    let ticker = Arc::new(Ticker::default());
    registry.add(ticker.clone()).unwrap();

    assert!(updates.frame_displayed());
    updates.wait_idle();
    clock.advance(Duration::from_millis(20));
    assert!(updates.frame_displayed());
    updates.wait_idle();

    assert_eq!(ticker.calls.load(Ordering::SeqCst), 1);
    assert_eq!(updates.last_metrics().unwrap().delta, Duration::from_millis(20));
}

#[test]
fn test_update_tick_drives_housekeeping() {
    #[derive(Default)]
    struct Buffer {
        disposed: AtomicBool,
    }

    impl Disposable for Buffer {
        fn is_disposed(&self) -> bool {
            self.disposed.load(Ordering::SeqCst)
        }

        fn dispose(&self) {
            self.disposed.store(true, Ordering::SeqCst);
        }
    }

    impl SceneObject for Buffer {
        fn capabilities(self: Arc<Self>) -> Vec<Capability> {
            vec![Capability::Disposable(self)]
        }
    }

    let (registry, clock, updates) = update_setup();
    let buffer = Arc::new(Buffer::default());
    let actor = Arc::new(Actor::new("mesh").with_support(buffer.clone()));
    registry.add_actor(&actor).unwrap();
    registry.remove_actor(&actor);
    buffer.dispose();

    updates.tick();
    clock.advance(Duration::from_millis(1500));
    match updates.tick() {
        UpdateOutcome::Updated(metrics) => assert_eq!(metrics.purged, 1),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(registry.tracked_disposables(), 0);
}
