#[cfg(target_arch = "wasm32")]
mod web {
    use std::cell::{Cell, RefCell};
    use std::panic;
    use std::rc::Rc;

    use anyhow::Result;
    use leptos::html::Canvas;
    use leptos::logging::{log, warn};
    use leptos::mount::mount_to_body;
    use leptos::prelude::*;
    use leptos::task::spawn_local;
    use model_view::config::ViewerConfig;
    use model_view::environment::load_cube_faces;
    use model_view::render::render::{Renderer, SurfaceSize};
    use model_view::render::viewer::{MousePressed, Viewer};
    use model_view::ViewerWrapper;
    use send_wrapper::SendWrapper;
    use web_sys::HtmlCanvasElement;
    use winit::application::ApplicationHandler;
    use winit::event::WindowEvent;
    use winit::event_loop::ActiveEventLoop;
    use winit::platform::web::{EventLoopExtWebSys, WindowAttributesExtWebSys};
    use winit::window::Window;
    use winit::{event, event_loop};

    struct WinitApp {
        window: Option<Window>,
        canvas: HtmlCanvasElement,
        viewer: Rc<RefCell<Viewer>>,
        size: Rc<RefCell<SurfaceSize>>,
    }

    impl WinitApp {
        fn new(canvas: HtmlCanvasElement, viewer: Rc<RefCell<Viewer>>) -> Self {
            Self {
                window: None,
                canvas,
                viewer,
                size: Default::default(),
            }
        }

        fn create_renderer(&mut self, width: u32, height: u32) {
            let canvas = self.canvas.clone();
            let size = self.size.clone();
            let (render, transparent) = {
                let viewer = self.viewer.borrow();
                (viewer.render.clone(), viewer.config().is_transparent())
            };
            spawn_local(async move {
                match Renderer::new(canvas, width, height, transparent).await {
                    Ok(mut r) => {
                        let latest = size.borrow_mut().created();
                        if let Some((w, h)) = latest {
                            if (w, h) != (r.w(), r.h()) {
                                r.resize(w, h);
                            }
                        }
                        render.borrow_mut().replace(r);
                    }
                    Err(e) => {
                        size.borrow_mut().failed();
                        web_sys::console::error_1(
                            &format!("create renderer failed by {:?}", e).into(),
                        );
                    }
                }
            })
        }
    }

    impl ApplicationHandler for WinitApp {
        fn resumed(&mut self, event_loop: &ActiveEventLoop) {
            match event_loop
                .create_window(Window::default_attributes().with_canvas(Some(self.canvas.clone())))
            {
                Ok(window) => {
                    window.request_redraw();
                    self.window = Some(window);
                }
                Err(e) => {
                    web_sys::console::error_1(&format!("create window failed by {:?}", e).into());
                }
            }
        }

        fn window_event(
            &mut self,
            _event_loop: &ActiveEventLoop,
            _window_id: winit::window::WindowId,
            event: WindowEvent,
        ) {
            match event {
                WindowEvent::CursorMoved { position, .. } => {
                    self.viewer.borrow_mut().mouse_move(position);
                }

                WindowEvent::MouseInput { state, button, .. } => match state {
                    event::ElementState::Pressed => match button {
                        event::MouseButton::Left => {
                            self.viewer.borrow_mut().pressed_state = MousePressed::Left(None);
                        }
                        event::MouseButton::Right => {
                            self.viewer.borrow_mut().pressed_state = MousePressed::Right(None);
                        }
                        _ => {}
                    },
                    event::ElementState::Released => {
                        self.viewer.borrow_mut().pressed_state = MousePressed::None;
                    }
                },

                WindowEvent::MouseWheel { delta, .. } => match delta {
                    event::MouseScrollDelta::PixelDelta(size) => {
                        self.viewer.borrow_mut().mouse_scroll(size.y);
                    }
                    event::MouseScrollDelta::LineDelta(_, y) => {
                        self.viewer.borrow_mut().mouse_scroll(y as f64);
                    }
                },

                WindowEvent::RedrawRequested => {
                    if let Err(msg) = self.viewer.borrow_mut().render() {
                        web_sys::console::error_1(
                            &format!("failed to render because {:?}", msg).into(),
                        );
                    }
                    if let Some(window) = self.window.as_ref() {
                        window.request_redraw();
                    }
                }

                WindowEvent::Resized(size) => {
                    let render = self.viewer.borrow().render.clone();
                    let mut render = render.borrow_mut();
                    if let Some(render) = render.as_mut() {
                        render.resize(size.width, size.height);
                    } else {
                        let start = self.size.borrow_mut().resized(size.width, size.height);
                        if let Some((w, h)) = start {
                            self.create_renderer(w, h);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn start_event_loop(canvas: HtmlCanvasElement, viewer: Rc<RefCell<Viewer>>) -> Result<()> {
        let event_loop = event_loop::EventLoop::new()?;
        event_loop.set_control_flow(event_loop::ControlFlow::Wait);
        event_loop.spawn_app(WinitApp::new(canvas, viewer));
        Ok(())
    }

    pub fn run() -> Result<()> {
        panic::set_hook(Box::new(console_error_panic_hook::hook));
        let search = web_sys::window()
            .and_then(|window| window.location().search().ok())
            .unwrap_or_default();
        let config = ViewerConfig::from_query(&search);
        log!("starting viewer, skin {}", config.skin);

        let environment = config.environment.clone();
        let render: Rc<RefCell<Option<Renderer>>> = Default::default();
        let viewer = Rc::new(RefCell::new(Viewer::new(render, config)));
        let viewer_wrapper: ViewerWrapper = SendWrapper::new(viewer.clone());
        let canvas: NodeRef<Canvas> = NodeRef::new();

        mount_to_body(move || {
            if let Some(environment) = environment {
                let viewer = viewer.clone();
                spawn_local(async move {
                    match load_cube_faces(&environment.urls).await {
                        Ok(faces) => viewer.borrow_mut().set_environment(Some(faces)),
                        Err(e) => {
                            warn!("environment unavailable, using a flat background: {:#}", e);
                            viewer.borrow_mut().set_environment(None);
                        }
                    }
                });
            }

            // The event loop starts once, when the canvas is mounted.
            let pending = SendWrapper::new(Cell::new(Some(viewer)));
            Effect::new(move |_| {
                if let Some(canvas_el) = canvas.get() {
                    if let Some(viewer) = pending.take() {
                        if let Err(e) = start_event_loop(canvas_el, viewer) {
                            web_sys::console::error_1(
                                &format!("create event loop failed by {:?}", e).into(),
                            );
                        }
                    }
                }
            });

            view! { <model_view::App canvas viewer = viewer_wrapper /> }
        });
        Ok(())
    }
}

#[cfg(target_arch = "wasm32")]
fn main() -> anyhow::Result<()> {
    web::run()
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    eprintln!("model-view runs in the browser: build it for wasm32 with trunk");
}
