// main.rs — 窗口、事件循环、菜单和状态栏

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // 在 Release 模式下隐藏控制台窗口

use sphere_mapper::input::{self, Command};
use sphere_mapper::projection::Projection;
use sphere_mapper::renderer::Renderer;
use sphere_mapper::session::Session;
use sphere_mapper::viewer::{self, MapViewer, WindowPoint};
use sphere_mapper::config;

use winit::{
    dpi::{LogicalSize, PhysicalPosition},
    event::*,
    event_loop::{ControlFlow, EventLoop},
    window::{CursorIcon, Fullscreen, Window, WindowBuilder},
};

use std::time::{Duration, Instant};

/// 帧时间统计：每秒更新 FPS，每 10 秒在 debug 级别打一次平均/最差帧时间
struct FrameStats {
    last_frame: Instant,
    fps_start: Instant,
    fps_frames: u32,
    report_start: Instant,
    report_frames: u32,
    worst: Duration,
}

impl FrameStats {
    fn new() -> Self {
        let now = Instant::now();
        Self {
            last_frame: now,
            fps_start: now,
            fps_frames: 0,
            report_start: now,
            report_frames: 0,
            worst: Duration::ZERO,
        }
    }

    /// 记一帧，满一秒时返回新的 FPS
    fn frame(&mut self) -> Option<f32> {
        let now = Instant::now();
        self.worst = self.worst.max(now - self.last_frame);
        self.last_frame = now;
        self.fps_frames += 1;
        self.report_frames += 1;

        let report = now.duration_since(self.report_start);
        if report >= Duration::from_secs(10) {
            log::debug!(
                "{} frames, avg {:.2} ms, worst {:.2} ms",
                self.report_frames,
                report.as_secs_f64() * 1000.0 / self.report_frames as f64,
                self.worst.as_secs_f64() * 1000.0
            );
            self.report_start = now;
            self.report_frames = 0;
            self.worst = Duration::ZERO;
        }

        let elapsed = now.duration_since(self.fps_start).as_secs_f32();
        if elapsed >= 1.0 {
            let fps = self.fps_frames as f32 / elapsed;
            self.fps_start = now;
            self.fps_frames = 0;
            return Some(fps);
        }
        None
    }
}

/// 菜单里可以直接改的开关
struct UiState {
    show_status: bool,
    vsync: bool,
    fps: f32,
}

fn fatal(what: &str, err: impl std::fmt::Display) -> ! {
    log::error!("{what}: {err}");
    std::process::exit(1);
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = config::load();

    let event_loop = EventLoop::new();
    let window = WindowBuilder::new()
        .with_title(&config.window.title)
        .with_inner_size(LogicalSize::new(config.window.width, config.window.height))
        .build(&event_loop)
        .unwrap_or_else(|e| fatal("failed to create window", e));

    let mut renderer = pollster::block_on(Renderer::new(&window, config.vsync))
        .unwrap_or_else(|e| fatal("failed to initialise renderer", e));
    let mut session = Session::start(&mut renderer, &config.image_dir, config.projection)
        .unwrap_or_else(|e| fatal("failed to load the initial map", e));
    let mut viewer = MapViewer::new(config.zoom_sensitivity);

    let clock = Instant::now();
    let mut cursor: Option<PhysicalPosition<f64>> = None;
    let mut stats = FrameStats::new();
    let mut ui = UiState {
        show_status: config.show_status,
        vsync: config.vsync,
        fps: 0.0,
    };

    event_loop.run(move |event, _, control_flow| {
        let now = clock.elapsed().as_secs_f64();

        match event {
            Event::WindowEvent { event, .. } => {
                // 先让 egui 处理事件
                let response = renderer.egui_state.on_event(&renderer.egui_ctx, &event);
                if response.repaint {
                    window.request_redraw();
                }
                if response.consumed {
                    return;
                }

                let point = |p: PhysicalPosition<f64>, size: winit::dpi::PhysicalSize<u32>| WindowPoint {
                    x: p.x,
                    y: p.y,
                    width: size.width as f64,
                    height: size.height as f64,
                };

                match event {
                    WindowEvent::CloseRequested => control_flow.set_exit(),

                    WindowEvent::Resized(new_size) => {
                        renderer.resize(new_size);
                        window.request_redraw();
                    }

                    WindowEvent::ScaleFactorChanged { new_inner_size, .. } => {
                        renderer.resize(*new_inner_size);
                    }

                    // 键盘快捷键
                    WindowEvent::KeyboardInput { input: key, .. } => {
                        if key.state == ElementState::Pressed {
                            if let Some(command) = key.virtual_keycode.and_then(input::command_for_key) {
                                if apply(command, &mut session, &mut renderer, &mut viewer, &window, now) {
                                    control_flow.set_exit();
                                }
                                window.request_redraw();
                            }
                        }
                    }

                    // 鼠标交互：左键拖动旋转，中键拖动滚转
                    WindowEvent::MouseInput { state, button, .. } => {
                        let output = session.output();
                        match (button, state, cursor) {
                            (MouseButton::Left, ElementState::Pressed, Some(p)) => {
                                viewer.begin_drag(point(p, renderer.size), output);
                            }
                            (MouseButton::Left, ElementState::Released, _) => viewer.end_drag(),
                            (MouseButton::Middle, ElementState::Pressed, Some(p)) => {
                                viewer.begin_roll_drag(point(p, renderer.size), output);
                            }
                            (MouseButton::Middle, ElementState::Released, _) => viewer.end_roll_drag(),
                            _ => {}
                        }
                        window.set_cursor_icon(if viewer.is_dragging() {
                            CursorIcon::Crosshair
                        } else {
                            CursorIcon::Default
                        });
                    }

                    WindowEvent::CursorMoved { position, .. } => {
                        cursor = Some(position);
                        if viewer.pointer_moved(point(position, renderer.size), session.output()) {
                            window.request_redraw();
                        }
                    }

                    WindowEvent::MouseWheel { delta, .. } => {
                        let scroll = match delta {
                            MouseScrollDelta::LineDelta(_, y) => y as f64,
                            MouseScrollDelta::PixelDelta(pos) => pos.y / 20.0,
                        };
                        viewer.scroll(scroll);
                        window.request_redraw();
                    }

                    _ => {}
                }
            }

            Event::RedrawRequested(_) => {
                if let Some(fps) = stats.frame() {
                    ui.fps = fps;
                }

                let output = session.output();
                let viewport = viewer::fit_viewport(renderer.size.width, renderer.size.height, output);
                if let Some(active) = session.active() {
                    renderer.update_view(
                        viewer.orientation.matrix(),
                        viewer.zoom,
                        active.texture.sx,
                        active.texture.sy,
                    );
                }

                let vsync_before = ui.vsync;
                let mut commands = Vec::new();
                let scene = session.active().map(|a| (&a.texture.handle, a.composition));
                let render_result = renderer.render_with_ui(&window, scene, viewport, |ctx| {
                    draw_ui(ctx, &session, &viewer, &mut ui, &mut commands);
                });

                match render_result {
                    Ok(_) => {}
                    Err(wgpu::SurfaceError::Lost) => renderer.resize(renderer.size),
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("GPU out of memory");
                        control_flow.set_exit();
                    }
                    Err(e) => log::warn!("render error: {e:?}"),
                }

                if ui.vsync != vsync_before {
                    renderer.set_vsync(ui.vsync);
                }
                for command in commands {
                    if apply(command, &mut session, &mut renderer, &mut viewer, &window, now) {
                        control_flow.set_exit();
                    }
                }
            }

            Event::MainEventsCleared => {
                if matches!(*control_flow, ControlFlow::ExitWithCode(_)) {
                    return;
                }
                // 动画期间持续刷新，空闲时阻塞等待输入
                if viewer.animate(now) {
                    window.request_redraw();
                    control_flow.set_poll();
                } else {
                    control_flow.set_wait();
                }
            }

            _ => {}
        }
    });
}

/// 执行一条命令，返回是否要退出
fn apply(
    command: Command,
    session: &mut Session<Renderer>,
    renderer: &mut Renderer,
    viewer: &mut MapViewer,
    window: &Window,
    now: f64,
) -> bool {
    let result = match command {
        Command::SelectMap(index) => session.select_map(renderer, index),
        Command::SelectEntry { pack, map } => session.select_entry(renderer, pack, map),
        Command::SelectPack(pack) => session.select_pack(renderer, pack),
        Command::SetProjection(p) => session.set_projection(renderer, p),
        Command::ResetRoll => {
            viewer.reset_roll(now);
            Ok(())
        }
        Command::ToggleLock => {
            viewer.toggle_lock(now);
            Ok(())
        }
        Command::ToggleFullscreen => {
            viewer.is_fullscreen = !viewer.is_fullscreen;
            if viewer.is_fullscreen {
                window.set_fullscreen(Some(Fullscreen::Borderless(None)));
            } else {
                window.set_fullscreen(None);
            }
            Ok(())
        }
        Command::Exit => return true,
    };
    if let Err(e) = result {
        log::warn!("{e}");
    }
    false
}

fn draw_ui(
    ctx: &egui::Context,
    session: &Session<Renderer>,
    viewer: &MapViewer,
    ui_state: &mut UiState,
    commands: &mut Vec<Command>,
) {
    egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
        egui::menu::bar(ui, |ui| {
            // Maps
            ui.menu_button("Maps", |ui| {
                for (i, pack) in session.packs().iter().enumerate() {
                    ui.menu_button(pack.name, |ui| {
                        for (j, map) in pack.maps.iter().enumerate() {
                            let selected = i == session.current_pack() && j == pack.current;
                            let label = format!("{} ({})", map.entry.file, map.entry.source);
                            if ui.radio(selected, label).clicked() {
                                commands.push(Command::SelectEntry { pack: i, map: j });
                                ui.close_menu();
                            }
                        }
                    });
                }
                ui.separator();
                if ui.button("Exit").clicked() {
                    commands.push(Command::Exit);
                }
            });

            // Projection
            ui.menu_button("Projection", |ui| {
                for p in Projection::ALL {
                    if ui.radio(session.output() == p, p.label()).clicked() {
                        commands.push(Command::SetProjection(p));
                        ui.close_menu();
                    }
                }
            });

            // View
            ui.menu_button("View", |ui| {
                if ui.button("Reset roll").clicked() {
                    commands.push(Command::ResetRoll);
                    ui.close_menu();
                }
                let lock_label = if viewer.is_locked() { "Unlock north" } else { "Lock north" };
                if ui.button(lock_label).clicked() {
                    commands.push(Command::ToggleLock);
                    ui.close_menu();
                }
                let fullscreen_label = if viewer.is_fullscreen { "Exit fullscreen" } else { "Fullscreen" };
                if ui.button(fullscreen_label).clicked() {
                    commands.push(Command::ToggleFullscreen);
                    ui.close_menu();
                }
                ui.separator();
                ui.checkbox(&mut ui_state.show_status, "Status bar");
                ui.checkbox(&mut ui_state.vsync, "VSync");
            });
        });
    });

    if !ui_state.show_status {
        return;
    }
    egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
        ui.horizontal(|ui| {
            if let Some(active) = session.active() {
                ui.label(format!("{} / {}", active.pack.name, active.map.entry.file));
                ui.label("|");
                ui.label(format!("{} → {}", active.source, active.output));
                ui.label("|");
            }
            ui.label(format!("Zoom: {:.2}x", viewer.zoom));
            ui.label("|");
            if viewer.is_locked() {
                ui.label(egui::RichText::new("North locked").color(egui::Color32::YELLOW));
            } else {
                ui.label(format!("Roll: {:.1}°", viewer.orientation.roll().to_degrees()));
            }
            ui.label("|");
            ui.label(egui::RichText::new(format!("FPS: {:.1}", ui_state.fps)).color(egui::Color32::GREEN));
        });
    });
}
