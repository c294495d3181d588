use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use softbuffer::Surface;
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow};
use winit::keyboard::Key;
use winit::window::{Window, WindowId};

use crate::fetcher::{FetchCompletion, FetchLauncher};
use crate::ui::state::ViewState;

pub mod render;
pub mod state;

const SHUTDOWN_GRACE: Duration = Duration::from_millis(1500);

// ---------------------------------------------------------------------------
// User event for waking the UI from fetch threads
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum UserEvent {
    Fetched(FetchCompletion),
}

// ---------------------------------------------------------------------------
// Application handler (winit 0.30 style)
// ---------------------------------------------------------------------------

pub struct App<L> {
    pub state: ViewState<L>,
    pub window: Option<Arc<Window>>,
    pub context: Option<softbuffer::Context<Arc<Window>>>,
    pub surface: Option<Surface<Arc<Window>, Arc<Window>>>,
}

impl<L: FetchLauncher> App<L> {
    pub fn new(state: ViewState<L>) -> Self {
        Self {
            state,
            window: None,
            context: None,
            surface: None,
        }
    }

    fn request_redraw(&self) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }

    fn quit(&mut self, event_loop: &ActiveEventLoop) {
        self.state.controller.shutdown(SHUTDOWN_GRACE);
        event_loop.exit();
    }
}

impl<L: FetchLauncher> ApplicationHandler<UserEvent> for App<L> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let attrs = Window::default_attributes()
            .with_title("randview")
            .with_inner_size(LogicalSize::new(850u32, 650u32))
            .with_min_inner_size(LogicalSize::new(600u32, 450u32));
        let window = Arc::new(event_loop.create_window(attrs).expect("create window"));
        let context = softbuffer::Context::new(Arc::clone(&window)).expect("create context");
        let surface = Surface::new(&context, Arc::clone(&window)).expect("create surface");

        self.state.controller.start();
        window.request_redraw();
        self.window = Some(window);
        self.context = Some(context);
        self.surface = Some(surface);
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: UserEvent) {
        match event {
            UserEvent::Fetched(completion) => {
                if let Some(notice) = self.state.controller.on_fetch_complete(completion) {
                    self.state.apply(notice);
                }
                self.request_redraw();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => self.quit(event_loop),

            WindowEvent::Resized(PhysicalSize { width, height }) => {
                if let (Some(surface), Some(w), Some(h)) = (
                    self.surface.as_mut(),
                    NonZeroU32::new(width.max(1)),
                    NonZeroU32::new(height.max(1)),
                ) {
                    let _ = surface.resize(w, h);
                }
                self.request_redraw();
            }

            WindowEvent::ModifiersChanged(modifiers) => {
                self.state.modifiers = modifiers.state();
            }

            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed || event.repeat {
                    return;
                }
                match &event.logical_key {
                    Key::Named(named) => {
                        self.state.keys_pressed.insert(*named);
                    }
                    Key::Character(s) => {
                        if let Some(c) = s.chars().next() {
                            self.state.chars_pressed.insert(c.to_ascii_lowercase());
                        }
                    }
                    _ => {}
                }
                self.request_redraw();
            }

            WindowEvent::RedrawRequested => {
                if self.state.update() {
                    self.quit(event_loop);
                    return;
                }

                let Some(window) = self.window.as_ref() else {
                    return;
                };
                window.set_title(&self.state.title());

                if let Some(ref mut surface) = self.surface {
                    let size = window.inner_size();
                    let fb_w = size.width.max(1);
                    let fb_h = size.height.max(1);
                    if let Ok(mut buffer) = surface.buffer_mut() {
                        self.state.render(&mut buffer, fb_w, fb_h);
                        let _ = buffer.present();
                    }
                }
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.poll_retry(Instant::now()) {
            self.request_redraw();
        }
        match self.state.retry_at {
            Some(when) => event_loop.set_control_flow(ControlFlow::WaitUntil(when)),
            None => event_loop.set_control_flow(ControlFlow::Wait),
        }
    }
}
