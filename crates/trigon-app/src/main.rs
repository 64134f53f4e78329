// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use anyhow::Result;
use clap::Parser;
use serde::Deserialize;
use std::fs;
use tracing::{error, info};
use trigon_core::init_tracing;
use trigon_platform::Clock;
use trigon_render::{frame_status, FrameOutcome, RenderSize, Renderer, RendererOptions};
use trigon_render_vk::VkRenderer;

use trigon_platform::winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{Key, NamedKey},
    raw_window_handle::{HasDisplayHandle, HasWindowHandle},
    window::{Window, WindowId},
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Window title
    #[arg(long)]
    title: Option<String>,

    /// Window width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Window height in pixels
    #[arg(long)]
    height: Option<u32>,

    /// Require Vulkan validation layers (setup fails if absent)
    #[arg(long)]
    validation: bool,

    /// Config file path
    #[arg(long, default_value = "trigon.toml")]
    config: String,
}

#[derive(Debug, Deserialize, Clone)]
struct WindowCfg {
    #[serde(default = "default_title")]
    title: String,
    #[serde(default = "default_width")]
    width: u32,
    #[serde(default = "default_height")]
    height: u32,
}

#[derive(Debug, Deserialize, Clone, Copy)]
struct RenderCfg {
    #[serde(default = "default_clear")]
    clear_color: [f32; 4],
    #[serde(default)]
    validation: bool,
}

#[derive(Debug, Deserialize, Default, Clone)]
struct AppCfg {
    #[serde(default)]
    window: WindowCfg,
    #[serde(default)]
    render: RenderCfg,
}

impl Default for WindowCfg {
    fn default() -> Self {
        WindowCfg {
            title: default_title(),
            width: default_width(),
            height: default_height(),
        }
    }
}

impl Default for RenderCfg {
    fn default() -> Self {
        RenderCfg {
            clear_color: default_clear(),
            validation: false,
        }
    }
}

fn default_title() -> String {
    "trigon".into()
}
fn default_width() -> u32 {
    800
}
fn default_height() -> u32 {
    600
}
fn default_clear() -> [f32; 4] {
    [0.02, 0.02, 0.04, 1.0]
}

fn load_cfg(path: &str) -> AppCfg {
    match fs::read_to_string(path) {
        Ok(s) => toml::from_str::<AppCfg>(&s).unwrap_or_default(),
        Err(_) => AppCfg::default(),
    }
}

/// CLI flags win over the config file.
fn apply_args(mut cfg: AppCfg, args: &Args) -> AppCfg {
    if let Some(title) = &args.title {
        cfg.window.title = title.clone();
    }
    if let Some(width) = args.width {
        cfg.window.width = width;
    }
    if let Some(height) = args.height {
        cfg.window.height = height;
    }
    if args.validation {
        cfg.render.validation = true;
    }
    cfg
}

struct App {
    cfg: AppCfg,
    window: Option<Window>,
    renderer: Option<VkRenderer>,
    render_size: RenderSize,

    clock: Clock,
    frames: u32,
    last_fps_tick: u64,

    paused: bool,
    exiting: bool,
    /// Per-stage setup status, surfaced as the process exit code.
    exit_status: Option<i32>,
}

impl App {
    fn quit(&mut self, event_loop: &ActiveEventLoop) {
        self.exiting = true;
        self.renderer = None;
        self.window = None;
        event_loop.exit();
    }

    /// The resize coordinator entry point: runs on explicit resize events
    /// and on stale frames alike.
    fn handle_resize(&mut self) {
        if let Some(renderer) = &mut self.renderer {
            if let Err(e) = renderer.resize(self.render_size) {
                error!("resize failed: {e}");
            }
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = Window::default_attributes()
            .with_title(self.cfg.window.title.clone())
            .with_inner_size(PhysicalSize::new(
                self.cfg.window.width,
                self.cfg.window.height,
            ));
        let window = match event_loop.create_window(attrs) {
            Ok(w) => w,
            Err(e) => {
                error!("create_window failed: {e}");
                self.exit_status = Some(1);
                event_loop.exit();
                return;
            }
        };

        let size = window.inner_size();
        self.render_size = RenderSize {
            width: size.width.max(1),
            height: size.height.max(1),
        };

        let wh = window.window_handle().expect("window_handle");
        let dh = window.display_handle().expect("display_handle");
        let opts = RendererOptions {
            app_name: self.cfg.window.title.clone(),
            validation: self.cfg.render.validation,
        };

        match VkRenderer::new(&wh, &dh, self.render_size, &opts) {
            Ok(renderer) => {
                info!(
                    "initialized: {} ({}x{})",
                    self.cfg.window.title, self.render_size.width, self.render_size.height
                );
                self.renderer = Some(renderer);
                self.window = Some(window);
            }
            Err(e) => {
                error!("setup failed: {e}");
                self.exit_status = Some(e.status());
                event_loop.exit();
                return;
            }
        }

        event_loop.set_control_flow(ControlFlow::Poll);
        if let Some(w) = &self.window {
            w.request_redraw();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if let Some(window) = &self.window {
            if window_id != window.id() {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("CloseRequested");
                self.quit(event_loop);
            }

            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key: Key::Named(NamedKey::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                info!("Escape");
                self.quit(event_loop);
            }

            WindowEvent::Resized(new_size) => {
                self.render_size = RenderSize {
                    width: new_size.width,
                    height: new_size.height,
                };
                self.paused = self.render_size.is_zero();
                info!(
                    "Resized -> {}x{} (paused={})",
                    self.render_size.width, self.render_size.height, self.paused
                );
                self.handle_resize();
                if !self.paused {
                    if let Some(w) = &self.window {
                        w.request_redraw();
                    }
                }
            }

            WindowEvent::Occluded(occluded) => {
                self.paused = occluded || self.render_size.is_zero();
                info!("Occluded={} (paused={})", occluded, self.paused);
            }

            WindowEvent::RedrawRequested => {
                if self.exiting || self.paused {
                    return;
                }

                if let Some(renderer) = &mut self.renderer {
                    let result = renderer.render(self.cfg.render.clear_color);
                    match &result {
                        Ok(FrameOutcome::Presented) => {
                            self.frames = self.frames.saturating_add(1);
                        }
                        Ok(FrameOutcome::Stale) => {
                            // Rebuild the chain, retry next tick.
                            self.handle_resize();
                        }
                        Err(e) => {
                            // Per-frame failures are logged and the loop
                            // keeps going; the chain may recover.
                            error!("frame error (status {}): {e}", frame_status(&result));
                        }
                    }
                }
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exiting {
            return;
        }

        if self.paused {
            event_loop.set_control_flow(ControlFlow::Wait);
            self.frames = 0;
            return;
        }

        event_loop.set_control_flow(ControlFlow::Poll);
        if let Some(w) = &self.window {
            w.request_redraw();
        }

        let now = self.clock.ticks_ms();
        if now.saturating_sub(self.last_fps_tick) >= 1_000 {
            info!("fps ~ {}", self.frames);
            self.frames = 0;
            self.last_fps_tick = now;
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let cfg = apply_args(load_cfg(&args.config), &args);

    let event_loop: EventLoop<()> = EventLoop::new()?;

    let mut app = App {
        cfg,
        window: None,
        renderer: None,
        render_size: RenderSize {
            width: 1,
            height: 1,
        },
        clock: Clock::start(),
        frames: 0,
        last_fps_tick: 0,
        paused: false,
        exiting: false,
        exit_status: None,
    };

    event_loop.run_app(&mut app)?;

    if let Some(code) = app.exit_status {
        std::process::exit(code);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_yields_defaults() {
        let cfg = load_cfg("/definitely/not/here/trigon.toml");
        assert_eq!(cfg.window.title, "trigon");
        assert_eq!((cfg.window.width, cfg.window.height), (800, 600));
        assert_eq!(cfg.render.clear_color, [0.02, 0.02, 0.04, 1.0]);
        assert!(!cfg.render.validation);
    }

    #[test]
    fn partial_config_fills_in_defaults() {
        let cfg: AppCfg = toml::from_str(
            r#"
            [window]
            title = "demo"

            [render]
            clear_color = [0.0, 0.0, 0.0, 1.0]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.window.title, "demo");
        assert_eq!(cfg.window.width, 800);
        assert_eq!(cfg.render.clear_color, [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn cli_flags_override_config() {
        let cfg = AppCfg::default();
        let args = Args {
            title: Some("t".into()),
            width: Some(640),
            height: None,
            validation: true,
            config: "trigon.toml".into(),
        };
        let merged = apply_args(cfg, &args);
        assert_eq!(merged.window.title, "t");
        assert_eq!(merged.window.width, 640);
        assert_eq!(merged.window.height, 600);
        assert!(merged.render.validation);
    }
}
