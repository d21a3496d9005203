use std::{
    cell::RefCell,
    rc::Rc,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use gloo_timers::future::TimeoutFuture;
use leptos::html;
use leptos::logging::{error, log};
use leptos::prelude::*;
use leptos::task::spawn_local;
use send_wrapper::SendWrapper;
use uuid::Uuid;

use crate::model::{read_model_from_file, ModelFormat};
use crate::render::viewer::Viewer;

mod toolbar;

pub use toolbar::Toolbar;

pub type ViewerWrapper = SendWrapper<Rc<RefCell<Viewer>>>;

const TOAST_MS: u32 = 5000;

#[derive(Clone, Debug, PartialEq)]
pub struct Toast {
    pub id: Uuid,
    pub message: String,
}

/// Numbers model loads so that only the most recent one is applied.
#[derive(Clone, Debug, Default)]
pub struct LoadSequence(Arc<AtomicU64>);

impl LoadSequence {
    /// Start a load, superseding any load still in flight.
    pub fn begin(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_current(&self, ticket: u64) -> bool {
        self.0.load(Ordering::SeqCst) == ticket
    }
}

/// Shared handle for components that drive the viewer.
#[derive(Clone)]
pub struct ViewerContext {
    pub viewer: ViewerWrapper,
    pub model_name: ReadSignal<Option<String>>,
    set_model_name: WriteSignal<Option<String>>,
    set_loading: WriteSignal<bool>,
    set_toasts: WriteSignal<Vec<Toast>>,
    loads: LoadSequence,
}

impl ViewerContext {
    /// Show `message` for a few seconds.
    pub fn show_error(&self, message: String) {
        error!("{}", message);
        let id = Uuid::new_v4();
        self.set_toasts
            .update(|toasts| toasts.push(Toast { id, message }));
        let set_toasts = self.set_toasts;
        spawn_local(async move {
            TimeoutFuture::new(TOAST_MS).await;
            set_toasts.update(|toasts| toasts.retain(|toast| toast.id != id));
        });
    }

    /// Read, parse and show `file`. Unsupported files are rejected before
    /// anything is read.
    pub fn load_file(&self, file: web_sys::File) {
        if let Err(err) = ModelFormat::from_file_name(&file.name()) {
            self.show_error(err.to_string());
            return;
        }
        self.set_loading.set(true);
        let ticket = self.loads.begin();
        let ctx = self.clone();
        spawn_local(async move {
            // Let the loading indicator paint before parsing blocks the thread.
            TimeoutFuture::new(10).await;
            let result = read_model_from_file(file).await;
            if !ctx.loads.is_current(ticket) {
                log!("dropping superseded load {}", ticket);
                return;
            }
            match result {
                Ok(mesh) => {
                    ctx.set_model_name.set(Some(mesh.name.clone()));
                    ctx.viewer.borrow_mut().set_model(mesh);
                }
                Err(err) => ctx.show_error(err.to_string()),
            }
            ctx.set_loading.set(false);
        });
    }
}

#[component]
pub fn App(canvas: NodeRef<html::Canvas>, viewer: ViewerWrapper) -> impl IntoView {
    let (loading, set_loading) = signal(false);
    let (toasts, set_toasts) = signal(Vec::<Toast>::new());
    let (model_name, set_model_name) = signal(None::<String>);
    let (dragging, set_dragging) = signal(false);
    let transparent = viewer.borrow().config().is_transparent();

    let ctx = ViewerContext {
        viewer,
        model_name,
        set_model_name,
        set_loading,
        set_toasts,
        loads: LoadSequence::default(),
    };
    provide_context(ctx.clone());

    let on_drop = move |ev: web_sys::DragEvent| {
        ev.prevent_default();
        set_dragging.set(false);
        if let Some(file) = ev
            .data_transfer()
            .and_then(|transfer| transfer.files())
            .and_then(|files| files.item(0))
        {
            ctx.load_file(file);
        }
    };

    let root_class = if transparent {
        "relative w-screen h-screen overflow-hidden bg-gradient-to-br from-slate-100 to-slate-300"
    } else {
        "relative w-screen h-screen overflow-hidden bg-neutral-900"
    };

    view! {
        <div
            class = root_class
            on:dragover = move |ev: web_sys::DragEvent| {
                ev.prevent_default();
                set_dragging.set(true);
            }
            on:dragleave = move |_| set_dragging.set(false)
            on:drop = on_drop
        >
            <canvas node_ref = canvas class = "block w-full h-full outline-none"/>
            <Toolbar/>
            <Show when = move || dragging.get()>
                <div class = "pointer-events-none absolute inset-4 rounded-xl border-4 border-dashed border-emerald-400 bg-emerald-100/20 flex items-center justify-center text-xl text-emerald-900">
                    "Drop a .gltf, .glb or .obj file"
                </div>
            </Show>
            <Show when = move || loading.get()>
                <div class = "absolute inset-0 flex items-center justify-center bg-black/30">
                    <div class = "px-6 py-3 rounded-full bg-white shadow text-emerald-900">"Loading model..."</div>
                </div>
            </Show>
            <div class = "absolute bottom-4 right-4 flex flex-col gap-2">
                <For
                    each = move || toasts.get()
                    key = |toast| toast.id
                    children = move |toast: Toast| view! {
                        <div class = "max-w-sm px-4 py-2 rounded shadow bg-red-600 text-white">{toast.message}</div>
                    }
                />
            </div>
        </div>
    }
}

#[cfg(test)]
mod tests {
    use super::LoadSequence;

    #[test]
    fn later_load_supersedes_earlier() {
        let loads = LoadSequence::default();
        let slow = loads.begin();
        let fast = loads.begin();
        assert!(!loads.is_current(slow));
        assert!(loads.is_current(fast));
    }

    #[test]
    fn clones_share_the_sequence() {
        let loads = LoadSequence::default();
        let ticket = loads.begin();
        let handle = loads.clone();
        assert!(handle.is_current(ticket));
        handle.begin();
        assert!(!loads.is_current(ticket));
    }
}
