//! Frame scheduler
//!
//! Renders one frame per call to [`FrameScheduler::render`], on the thread
//! that owns the graphics device. A frame runs these steps in order:
//!
//! 1. release resources waiting for teardown
//! 2. upload resources of visible actors, rate limiting slow ones
//! 3. take the accumulated repaint mask and widen it to what the device
//!    can preserve
//! 4. resolve colour-identification picks
//! 5. resolve geometric picks
//! 6. draw the scene, interface and overlay layers
//!
//! The renderer-state stack is checked after the lifecycle steps, after each
//! pick pass and after the geometry passes; leaks are logged and unwound.
//! A hook that fails or panics abandons the frame without taking the
//! scheduler down.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::core::config::FrameConfig;
use crate::events::PickEvent;
use crate::render::camera::{Camera, ColorPickingCamera};
use crate::render::context::RenderContext;
use crate::render::device::{DeviceCapabilities, DrawTarget, GraphicsDevice};
use crate::render::frustum::Frustum;
use crate::render::pass::DrawingPass;
use crate::render::picking::{
    decode_pick_color, encode_pick_id, pick_target, pick_target_shares_frame, ColorPickResult,
    PickHit,
};
use crate::render::{Color, RenderResult};
use crate::scene::{Actor, Indexed, Scene};
use crate::scheduler::metrics::{FrameMetrics, FrameStatistics};
use crate::scheduler::repaint::expand_repaint_mask;

/// Clears the drawing flag when a frame ends, however it ends
struct DrawingGuard<'a>(&'a AtomicBool);

impl Drop for DrawingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

fn describe_target(target: DrawTarget) -> String {
    match target {
        DrawTarget::Front => "the visible buffer (debug)".to_string(),
        DrawTarget::Back => "the back buffer".to_string(),
        DrawTarget::Auxiliary(index) => format!("auxiliary buffer {index}"),
        DrawTarget::Texture => "an offscreen texture".to_string(),
    }
}

/// Per-frame render driver
pub struct FrameScheduler {
    scene: Arc<Scene>,
    config: FrameConfig,
    drawing: AtomicBool,
    capabilities: Mutex<Option<DeviceCapabilities>>,
    frames_rendered: AtomicU64,
    last_metrics: Mutex<Option<FrameMetrics>>,
    statistics: Mutex<FrameStatistics>,
}

impl FrameScheduler {
    /// Scheduler rendering `scene`
    pub fn new(scene: Arc<Scene>, config: FrameConfig) -> Self {
        Self {
            scene,
            config,
            drawing: AtomicBool::new(false),
            capabilities: Mutex::new(None),
            frames_rendered: AtomicU64::new(0),
            last_metrics: Mutex::new(None),
            statistics: Mutex::new(FrameStatistics::default()),
        }
    }

    /// The rendered scene
    pub fn scene(&self) -> &Arc<Scene> {
        &self.scene
    }

    /// Frame configuration
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// Whether a frame is being rendered right now
    pub fn is_drawing(&self) -> bool {
        self.drawing.load(Ordering::Acquire)
    }

    /// Frames rendered to completion
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered.load(Ordering::Acquire)
    }

    /// Counters of the last completed frame
    pub fn last_metrics(&self) -> Option<FrameMetrics> {
        self.last_metrics.lock().clone()
    }

    /// Totals over every frame
    pub fn statistics(&self) -> FrameStatistics {
        self.statistics.lock().clone()
    }

    /// Capabilities in effect, once the first frame discovered them
    pub fn device_capabilities(&self) -> Option<DeviceCapabilities> {
        *self.capabilities.lock()
    }

    /// Forget discovered capabilities (e.g. after the context was recreated)
    pub fn reset_capabilities(&self) {
        *self.capabilities.lock() = None;
    }

    /// Render one frame
    ///
    /// Returns false when nothing was rendered: either another frame is
    /// already in flight (the call is dropped, not queued) or a hook failed.
    pub fn render(&self, device: &mut dyn GraphicsDevice) -> bool {
        if self
            .drawing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::trace!("Frame dropped: a frame is already being rendered");
            return false;
        }
        let _guard = DrawingGuard(&self.drawing);

        let caps = self.discover_capabilities(device);
        let started = Instant::now();
        let baseline = device.state_depth();
        let mut metrics = FrameMetrics {
            stack_depth_start: baseline,
            ..FrameMetrics::default()
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.render_frame(&mut *device, &caps, baseline, &mut metrics)
        }));
        let rendered = match outcome {
            Ok(Ok(())) => true,
            Ok(Err(err)) => {
                log::error!("Frame abandoned: {}", err);
                false
            }
            Err(payload) => {
                log::error!("Frame abandoned: render hook panicked: {}", panic_message(&*payload));
                false
            }
        };
        if !rendered {
            Self::restore_state_stack(device, baseline, "failed frame", &mut metrics);
            // The taken mask was never drawn; hand it to the next frame
            self.scene.request_repaint(metrics.repainted);
        }

        metrics.elapsed = started.elapsed();
        metrics.stack_depth_end = device.state_depth();
        metrics.device_errors = device.take_error_count();
        if metrics.device_errors > 0 {
            log::warn!("Device raised {} error(s) during the frame", metrics.device_errors);
        }

        if rendered {
            self.frames_rendered.fetch_add(1, Ordering::AcqRel);
            self.statistics.lock().record(&metrics);
            *self.last_metrics.lock() = Some(metrics);
        } else {
            self.statistics.lock().record_failure(&metrics);
        }
        rendered
    }

    fn discover_capabilities(&self, device: &dyn GraphicsDevice) -> DeviceCapabilities {
        let mut cached = self.capabilities.lock();
        if let Some(caps) = *cached {
            return caps;
        }

        let caps = self.config.hints.apply(device.capabilities());
        log::info!(
            "Device capabilities: double buffered {}, {} auxiliary buffer(s), stereo {}, \
             multisample {}",
            caps.double_buffered,
            caps.aux_buffers,
            caps.stereo,
            caps.multisample
        );
        log::info!(
            "Colour picking renders into {}",
            describe_target(pick_target(self.config.pick_buffer, &caps))
        );
        *cached = Some(caps);
        caps
    }

    fn render_frame(
        &self,
        device: &mut dyn GraphicsDevice,
        caps: &DeviceCapabilities,
        baseline: usize,
        metrics: &mut FrameMetrics,
    ) -> RenderResult {
        let registry = self.scene.registry();

        let mut carry_over = self.release_resources(device, metrics)?;
        carry_over |= self.upload_resources(device, metrics)?;
        self.check_state_stack(device, baseline, "resource lifecycle", metrics);

        let color_cameras: Vec<_> = registry
            .color_picking_cameras()
            .into_iter()
            .filter(|camera| camera.capability.is_visible())
            .collect();
        if color_cameras.iter().any(|camera| camera.capability.has_pending_events()) {
            self.scene.request_repaint(DrawingPass::PICKING);
        }

        let mut mask = expand_repaint_mask(self.scene.take_repaint(), caps);
        metrics.repainted = mask;
        if !carry_over.is_empty() {
            self.scene.request_repaint(carry_over);
        }

        if mask.is_picking() && !color_cameras.is_empty() {
            let target = pick_target(self.config.pick_buffer, caps);
            let drew = self.color_pick_pass(device, caps, target, &color_cameras, metrics)?;
            if drew && pick_target_shares_frame(target) {
                mask |= DrawingPass::VISUAL;
            }
            self.check_state_stack(device, baseline, "colour pick pass", metrics);
        }

        self.ray_pick_pass(metrics);
        self.check_state_stack(device, baseline, "ray pick pass", metrics);

        self.geometry_passes(device, caps, mask, metrics)?;
        self.check_state_stack(device, baseline, "geometry passes", metrics);

        metrics.repainted = mask;
        Ok(())
    }

    /// Release every resource waiting for teardown; returns the visible
    /// layers the releases invalidated
    fn release_resources(
        &self,
        device: &mut dyn GraphicsDevice,
        metrics: &mut FrameMetrics,
    ) -> RenderResult<DrawingPass> {
        let mut invalidated = DrawingPass::empty();
        for resource in self.scene.registry().uninitializables() {
            if !resource.capability.is_initialized() {
                continue;
            }
            resource.capability.uninitialize(device)?;
            metrics.resources_released += 1;
            if let Some(owner) = resource.owner.as_ref().filter(|owner| owner.is_visible()) {
                invalidated |= owner.drawing_pass();
            }
        }
        Ok(invalidated)
    }

    /// Upload resources of visible owners and release those of hidden ones;
    /// returns the layers of slow resources left pending
    fn upload_resources(
        &self,
        device: &mut dyn GraphicsDevice,
        metrics: &mut FrameMetrics,
    ) -> RenderResult<DrawingPass> {
        let mut budget = self.config.max_slow_initializations_per_frame;
        let mut pending = DrawingPass::empty();

        for resource in self.scene.registry().initializables() {
            let initialized = resource.capability.is_initialized();
            if !resource.owner_visible() {
                if initialized {
                    resource.capability.uninitialize(device)?;
                    metrics.resources_released += 1;
                }
                continue;
            }
            if initialized {
                continue;
            }

            if resource.capability.is_slow() {
                if budget == 0 {
                    metrics.resources_deferred += 1;
                    if let Some(owner) = &resource.owner {
                        pending |= owner.drawing_pass();
                    }
                    continue;
                }
                budget -= 1;
            }
            resource.capability.initialize(device)?;
            metrics.resources_initialized += 1;
        }

        if metrics.resources_deferred > 0 {
            log::debug!(
                "{} slow resource upload(s) deferred to the next frame",
                metrics.resources_deferred
            );
        }
        Ok(pending)
    }

    /// Draw the pick image for every camera with pending requests and
    /// resolve the requests; returns whether anything was drawn
    fn color_pick_pass(
        &self,
        device: &mut dyn GraphicsDevice,
        caps: &DeviceCapabilities,
        target: DrawTarget,
        cameras: &[Indexed<dyn ColorPickingCamera>],
        metrics: &mut FrameMetrics,
    ) -> RenderResult<bool> {
        let roots = self.scene.registry().visible_root_actors();
        let mut drew = false;

        for camera in cameras.iter().map(|indexed| &indexed.capability) {
            let events = camera.drain_events();
            if events.is_empty() {
                continue;
            }
            drew = true;

            device.set_draw_target(target);
            device.clear(Color::BLACK);
            device.load_identity();
            camera.begin_projection(device)?;

            let mut table = Vec::new();
            {
                let mut ctx = RenderContext::for_picking(device);
                for root in &roots {
                    Self::draw_pick_actor(
                        &mut ctx,
                        camera.name(),
                        camera.drawing_pass(),
                        root,
                        false,
                        &mut table,
                    )?;
                }
                metrics.vertices += ctx.vertices();
            }
            camera.end_projection(device)?;

            for event in events {
                let actor = Self::resolve_color_pick(device, &event, &table);
                if let Some(pick) = actor.as_ref().and_then(|actor| actor.pick_behavior()) {
                    pick.picked(&event);
                }
                log::debug!(
                    "Colour pick at ({}, {}) on camera '{}': {:?}",
                    event.x,
                    event.y,
                    camera.name(),
                    actor.as_ref().map(|actor| actor.id())
                );
                camera.deliver(ColorPickResult { event, actor });
                metrics.pick_events += 1;
            }
        }

        if drew {
            device.set_draw_target(caps.default_draw_target());
        }
        Ok(drew)
    }

    fn resolve_color_pick(
        device: &mut dyn GraphicsDevice,
        event: &PickEvent,
        table: &[Arc<Actor>],
    ) -> Option<Arc<Actor>> {
        let (x, y) = event.pixel()?;
        let index = decode_pick_color(device.read_pixel(x, y)?)?;
        table.get(usize::try_from(index).ok()?).cloned()
    }

    fn draw_pick_actor(
        ctx: &mut RenderContext<'_>,
        camera: &str,
        camera_pass: DrawingPass,
        actor: &Arc<Actor>,
        inherited: bool,
        table: &mut Vec<Arc<Actor>>,
    ) -> RenderResult {
        if !actor.is_visible() || !actor.accepts_camera(camera) {
            return Ok(());
        }
        let pass = actor.drawing_pass();
        let in_pass = inherited
            || (pass.is_picking() && camera_pass.intersects(pass.difference(DrawingPass::PICKING)));
        if !in_pass && !actor.has_children() {
            return Ok(());
        }

        let transform = actor.transform().cloned();
        if let Some(transform) = &transform {
            transform.push(ctx.device());
        }
        let result = Self::pick_actor_contents(ctx, camera, camera_pass, actor, in_pass, table);
        if let Some(transform) = &transform {
            transform.pop(ctx.device());
        }
        result
    }

    fn pick_actor_contents(
        ctx: &mut RenderContext<'_>,
        camera: &str,
        camera_pass: DrawingPass,
        actor: &Arc<Actor>,
        in_pass: bool,
        table: &mut Vec<Arc<Actor>>,
    ) -> RenderResult {
        if in_pass {
            if let Some(renderable) = actor.renderable() {
                match u32::try_from(table.len()).ok().and_then(encode_pick_id) {
                    Some(color) => {
                        table.push(Arc::clone(actor));
                        ctx.pin_pick_color(color);
                        ctx.device().set_line_style(renderable.is_wire(), renderable.thickness());
                        renderable.draw(ctx)?;
                        renderable.end_draw(ctx)?;
                    }
                    None => log::warn!(
                        "Pick id space exhausted; '{}' is not pickable this frame",
                        actor.id()
                    ),
                }
            }
        }

        if actor.inherits() && !in_pass {
            return Ok(());
        }
        let inherit = in_pass && actor.inherits();
        for child in actor.children() {
            Self::draw_pick_actor(ctx, camera, camera_pass, &child, inherit, table)?;
        }
        Ok(())
    }

    fn ray_pick_pass(&self, metrics: &mut FrameMetrics) {
        let registry = self.scene.registry();
        let cameras: Vec<_> = registry
            .picking_cameras()
            .into_iter()
            .map(|indexed| indexed.capability)
            .filter(|camera| camera.is_visible())
            .collect();
        if cameras.is_empty() {
            return;
        }
        let roots = registry.visible_root_actors();

        for camera in &cameras {
            let events = camera.drain_events();
            if events.is_empty() {
                continue;
            }
            let frustum = camera.frustum();

            for event in events {
                let volume = camera.pick_volume(&event);
                let mut hits = Vec::new();
                for root in &roots {
                    Self::pick_actor(camera.name(), &event, &volume, &frustum, root, &mut hits);
                }
                hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
                camera.deliver(&event, &hits);
                metrics.pick_events += 1;
            }
        }
    }

    fn pick_actor(
        camera: &str,
        event: &PickEvent,
        volume: &Frustum,
        frustum: &Frustum,
        actor: &Arc<Actor>,
        hits: &mut Vec<PickHit>,
    ) {
        if !actor.is_visible() || !actor.accepts_camera(camera) {
            return;
        }
        if let Some(sphere) = actor.culling() {
            if !volume.intersects_sphere(&sphere) || !frustum.intersects_sphere(&sphere) {
                return;
            }
        }
        if let Some(distance) = actor.pick_behavior().and_then(|pick| pick.pick(event, volume)) {
            hits.push(PickHit {
                actor: Arc::clone(actor),
                distance,
            });
        }
        for child in actor.children() {
            Self::pick_actor(camera, event, volume, frustum, &child, hits);
        }
    }

    /// Sub-pass indices in drawing order: the scene back to front, the
    /// interface front to back, the overlay once
    fn sub_pass_order(&self, layer: DrawingPass) -> Vec<u32> {
        if layer == DrawingPass::SCENE {
            (0..self.config.scene_passes).rev().collect()
        } else if layer == DrawingPass::INTERFACE {
            (0..self.config.interface_passes).collect()
        } else {
            vec![0]
        }
    }

    fn geometry_passes(
        &self,
        device: &mut dyn GraphicsDevice,
        caps: &DeviceCapabilities,
        mask: DrawingPass,
        metrics: &mut FrameMetrics,
    ) -> RenderResult {
        if !mask.touches_visual() {
            return Ok(());
        }

        let registry = self.scene.registry();
        device.set_draw_target(caps.default_draw_target());
        if mask.is_scene() {
            device.clear(self.scene.background());
        }

        let cameras: Vec<Arc<dyn Camera>> = registry
            .cameras()
            .into_iter()
            .map(|indexed| indexed.capability)
            .filter(|camera| camera.is_visible())
            .collect();
        let roots = registry.visible_root_actors();

        for layer in [DrawingPass::SCENE, DrawingPass::INTERFACE, DrawingPass::OVERLAY] {
            if !mask.contains(layer) {
                continue;
            }
            for sub_pass in self.sub_pass_order(layer) {
                let layer_cameras =
                    cameras.iter().filter(|camera| camera.drawing_pass().contains(layer));
                for camera in layer_cameras {
                    device.load_identity();
                    camera.begin_projection(device)?;
                    let frustum = camera.frustum();

                    let mut ctx = RenderContext::new(device, layer, sub_pass);
                    for root in &roots {
                        Self::draw_actor(&mut ctx, camera.name(), &frustum, root, false, metrics)?;
                    }
                    metrics.vertices += ctx.vertices();

                    camera.end_projection(device)?;
                }
            }
        }
        Ok(())
    }

    fn draw_actor(
        ctx: &mut RenderContext<'_>,
        camera: &str,
        frustum: &Frustum,
        actor: &Arc<Actor>,
        inherited: bool,
        metrics: &mut FrameMetrics,
    ) -> RenderResult {
        if !actor.is_visible() || !actor.accepts_camera(camera) {
            return Ok(());
        }
        let in_layer = inherited
            || (actor.drawing_pass().contains(ctx.layer())
                && actor.pass_number() == ctx.sub_pass());
        if !in_layer && !actor.has_children() {
            return Ok(());
        }
        if let Some(sphere) = actor.culling() {
            if !frustum.intersects_sphere(&sphere) {
                metrics.culled += 1;
                return Ok(());
            }
        }

        let transform = actor.transform().cloned();
        if let Some(transform) = &transform {
            transform.push(ctx.device());
        }
        let result = Self::draw_actor_contents(ctx, camera, frustum, actor, in_layer, metrics);
        if let Some(transform) = &transform {
            transform.pop(ctx.device());
        }
        result
    }

    fn draw_actor_contents(
        ctx: &mut RenderContext<'_>,
        camera: &str,
        frustum: &Frustum,
        actor: &Arc<Actor>,
        in_layer: bool,
        metrics: &mut FrameMetrics,
    ) -> RenderResult {
        if in_layer {
            if let Some(renderable) = actor.renderable() {
                ctx.device().set_line_style(renderable.is_wire(), renderable.thickness());
                renderable.draw(ctx)?;
                renderable.end_draw(ctx)?;
            }
        }

        // Inheriting children are drawn only where their parent is
        if actor.inherits() && !in_layer {
            return Ok(());
        }
        let inherit = in_layer && actor.inherits();
        for child in actor.children() {
            Self::draw_actor(ctx, camera, frustum, &child, inherit, metrics)?;
        }
        Ok(())
    }

    fn check_state_stack(
        &self,
        device: &mut dyn GraphicsDevice,
        baseline: usize,
        checkpoint: &str,
        metrics: &mut FrameMetrics,
    ) {
        if self.config.check_state_stack {
            Self::restore_state_stack(device, baseline, checkpoint, metrics);
        }
    }

    fn restore_state_stack(
        device: &mut dyn GraphicsDevice,
        baseline: usize,
        checkpoint: &str,
        metrics: &mut FrameMetrics,
    ) {
        let depth = device.state_depth();
        if depth == baseline {
            return;
        }
        metrics.stack_leaks += 1;

        if depth < baseline {
            log::warn!(
                "Renderer state stack underflow after {}: depth {} below frame start {}",
                checkpoint,
                depth,
                baseline
            );
            return;
        }

        log::warn!(
            "Renderer state stack leak after {}: {} unmatched push(es), unwinding",
            checkpoint,
            depth - baseline
        );
        while device.state_depth() > baseline {
            if !device.pop_state() {
                break;
            }
        }
    }
}
