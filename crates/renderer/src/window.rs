use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use tracing::{error, info, trace, warn};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, KeyEvent, TouchPhase, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Fullscreen, WindowBuilder};

use crate::surface::WaterSurface;
use crate::types::SurfaceConfig;

/// Keyboard actions the window understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyAction {
    Skip,
    Quit,
}

fn key_action(event: &KeyEvent) -> Option<KeyAction> {
    if event.state != ElementState::Pressed || event.repeat {
        return None;
    }
    match &event.logical_key {
        Key::Named(NamedKey::Space) => Some(KeyAction::Skip),
        Key::Character(value) if value.as_str() == " " => Some(KeyAction::Skip),
        Key::Named(NamedKey::Escape) => Some(KeyAction::Quit),
        _ => None,
    }
}

/// Owns the configuration and drives the `winit` event loop.
///
/// The window, GPU context and scene are created inside [`Renderer::run`] and
/// live until the loop exits. Pointer and touch motion drop ripples, Space
/// skips to the next slide, Escape or closing the window tears the surface
/// down and leaves the loop.
pub struct Renderer {
    config: SurfaceConfig,
}

impl Renderer {
    pub fn new(config: SurfaceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SurfaceConfig {
        &self.config
    }

    pub fn run(self) -> Result<()> {
        let event_loop = EventLoop::new().context("failed to initialise event loop")?;
        let (width, height) = self.config.window_size;
        let mut builder = WindowBuilder::new()
            .with_title("ripplewall")
            .with_inner_size(PhysicalSize::new(width.max(1), height.max(1)));
        if self.config.fullscreen {
            builder = builder.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }
        let window = builder
            .build(&event_loop)
            .context("failed to create window")?;
        let window = Arc::new(window);

        let mut surface = WaterSurface::mount(window, self.config)
            .context("failed to mount water surface")?;
        surface.window().request_redraw();

        let run_result = event_loop.run(move |event, elwt| match event {
            Event::WindowEvent { window_id, event } if window_id == surface.window().id() => {
                handle_window_event(&mut surface, event, elwt);
            }
            Event::AboutToWait => schedule_next_frame(&surface, elwt),
            Event::LoopExiting => surface.teardown(),
            _ => {}
        });

        run_result.map_err(|err| anyhow!("window event loop error: {err}"))
    }
}

fn handle_window_event(
    surface: &mut WaterSurface,
    event: WindowEvent,
    elwt: &EventLoopWindowTarget<()>,
) {
    match event {
        WindowEvent::CloseRequested | WindowEvent::Destroyed => {
            surface.teardown();
            elwt.exit();
        }
        WindowEvent::KeyboardInput { event, .. } => match key_action(&event) {
            Some(KeyAction::Skip) => surface.skip(Instant::now()),
            Some(KeyAction::Quit) => {
                info!("escape pressed; exiting");
                surface.teardown();
                elwt.exit();
            }
            None => {}
        },
        WindowEvent::CursorMoved { position, .. } => {
            surface.pointer_moved(position.x, position.y, Instant::now());
        }
        WindowEvent::Touch(touch) => {
            if touch.phase == TouchPhase::Moved {
                surface.touch_moved(touch.location.x, touch.location.y, Instant::now());
            }
        }
        WindowEvent::Resized(new_size) => surface.resize(new_size),
        WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
            surface.set_scale_factor(scale_factor);
        }
        WindowEvent::RedrawRequested => match surface.render_frame(Instant::now()) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                warn!("surface lost or outdated; reconfiguring");
                surface.reconfigure();
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                error!("surface out of memory; exiting");
                surface.teardown();
                elwt.exit();
            }
            Err(wgpu::SurfaceError::Timeout) => {
                warn!("surface timeout; retrying next frame");
            }
            Err(other) => {
                warn!(error = ?other, "surface error; retrying next frame");
            }
        },
        _ => {}
    }
}

fn schedule_next_frame(surface: &WaterSurface, elwt: &EventLoopWindowTarget<()>) {
    if !surface.is_active() {
        elwt.set_control_flow(ControlFlow::Wait);
        return;
    }
    let now = Instant::now();
    if surface.ready_for_frame(now) {
        trace!("scheduler: issuing redraw now");
        surface.window().request_redraw();
        elwt.set_control_flow(ControlFlow::Wait);
    } else if let Some(deadline) = surface.next_deadline() {
        trace!(
            deadline_ms = deadline.saturating_duration_since(now).as_millis() as u64,
            "scheduler: waiting until next frame"
        );
        elwt.set_control_flow(ControlFlow::WaitUntil(deadline));
    } else {
        elwt.set_control_flow(ControlFlow::Wait);
    }
}
