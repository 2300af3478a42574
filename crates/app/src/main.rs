//! Rendering host - main entry point.
//!
//! A minimal real-time rendering host: it owns a graphics device, a swapchain
//! of back buffers, and the synchronization machinery to render and present
//! frames without tearing artifacts or resource hazards.
//!
//! Keys: `V` toggles vsync, `F11` toggles fullscreen, `Esc` quits.

use std::path::Path;

use anyhow::Result;
use tracing::{error, info};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowId;

use renderhost_core::Settings;
use renderhost_platform::{SurfaceEvent, Window};
use renderhost_renderer::Renderer;

/// Default settings path when none is given on the command line.
const DEFAULT_CONFIG_PATH: &str = "resources/config.json";

struct App {
    settings: Settings,
    window: Option<Window>,
    renderer: Option<Renderer>,
}

impl App {
    fn new(settings: Settings) -> Self {
        Self {
            settings,
            window: None,
            renderer: None,
        }
    }

    /// Forwards a surface event to the renderer, exiting on fatal errors.
    fn dispatch(&mut self, event_loop: &ActiveEventLoop, event: SurfaceEvent) {
        if let Some(ref mut renderer) = self.renderer {
            if let Err(e) = renderer.handle_event(event) {
                error!("Unrecoverable render error: {:?}", e);
                event_loop.exit();
            }
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let app = &self.settings.application_settings;
        match Window::new(event_loop, app.window_width, app.window_height, &app.name) {
            Ok(window) => match Renderer::new(&window, true) {
                Ok(renderer) => {
                    info!("Initialization complete, entering main loop");
                    self.renderer = Some(renderer);
                    self.window = Some(window);
                }
                Err(e) => {
                    error!("Failed to create renderer: {:?}", e);
                    event_loop.exit();
                }
            },
            Err(e) => {
                error!("Failed to create window: {}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                self.dispatch(event_loop, SurfaceEvent::CloseRequested);
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(ref mut window) = self.window {
                    window.resize(size.width, size.height);
                }
                self.dispatch(
                    event_loop,
                    SurfaceEvent::Resized {
                        width: size.width,
                        height: size.height,
                    },
                );
            }
            WindowEvent::RedrawRequested => {
                self.dispatch(event_loop, SurfaceEvent::Redraw);
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if !event.state.is_pressed() {
                    return;
                }
                if let PhysicalKey::Code(key) = event.physical_key {
                    match key {
                        KeyCode::Escape => {
                            info!("Escape pressed, shutting down");
                            event_loop.exit();
                        }
                        KeyCode::KeyV => {
                            if let Some(ref mut renderer) = self.renderer {
                                let vsync = !renderer.vsync();
                                renderer.set_vsync(vsync);
                            }
                        }
                        KeyCode::F11 => {
                            if let Some(ref mut window) = self.window {
                                let fullscreen = !window.is_fullscreen();
                                window.set_fullscreen(fullscreen);
                            }
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    renderhost_core::init_logging();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    info!("Starting host with config: {}", config_path);

    let settings = Settings::load_or_default(Path::new(&config_path))?;

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(settings);
    event_loop.run_app(&mut app)?;

    info!("Clean exit");
    Ok(())
}
