use gloo_timers::future::TimeoutFuture;
use leptos::html;
use leptos::prelude::*;
use leptos::task::spawn_local;

use super::ViewerContext;
use crate::model::ACCEPTED_EXTENSIONS;

const FPS_POLL_MS: u32 = 500;
const BUTTON_CLASS: &str =
    "px-3 py-1 rounded-full border border-emerald-600 bg-emerald-100 hover:bg-emerald-200 text-emerald-900";

#[component]
pub fn Toolbar() -> impl IntoView {
    let ctx = expect_context::<ViewerContext>();
    let (speed, set_speed) = signal(ctx.viewer.borrow().rotation_speed());
    let (rotating, set_rotating) = signal(ctx.viewer.borrow().rotation_enabled());
    let (fps, set_fps) = signal(0u32);
    let file_input = NodeRef::<html::Input>::new();

    {
        let viewer = ctx.viewer.clone();
        spawn_local(async move {
            loop {
                TimeoutFuture::new(FPS_POLL_MS).await;
                let current = viewer.borrow().fps();
                if set_fps.try_set(current).is_some() {
                    break;
                }
            }
        });
    }

    let on_change = {
        let ctx = ctx.clone();
        move |_| {
            if let Some(input) = file_input.get() {
                if let Some(file) = input.files().and_then(|files| files.item(0)) {
                    ctx.load_file(file);
                }
                // Picking the same file again still fires a change.
                input.set_value("");
            }
        }
    };
    let open_picker = move |_| {
        if let Some(input) = file_input.get() {
            input.click();
        }
    };
    let on_speed = {
        let viewer = ctx.viewer.clone();
        move |ev| {
            if let Ok(value) = event_target_value(&ev).parse::<f32>() {
                set_speed.set(value);
                viewer.borrow_mut().set_rotation_speed(value);
            }
        }
    };
    let toggle_rotation = {
        let viewer = ctx.viewer.clone();
        move |_| set_rotating.set(viewer.borrow_mut().toggle_rotation())
    };
    let reset_camera = {
        let viewer = ctx.viewer.clone();
        move |_| viewer.borrow_mut().reset_camera()
    };
    let model_name = ctx.model_name;

    view! {
        <div class = "absolute top-4 left-4 flex flex-wrap items-center gap-3 p-3 rounded-xl shadow bg-white/80 text-sm">
            <input
                type = "file"
                node_ref = file_input
                accept = ACCEPTED_EXTENSIONS
                class = "hidden"
                on:change = on_change
            />
            <button class = BUTTON_CLASS on:click = open_picker>"Load Model"</button>
            <label class = "flex items-center gap-2">
                "Speed"
                <input
                    type = "range"
                    min = "0"
                    max = "5"
                    step = "0.1"
                    prop:value = move || speed.get().to_string()
                    on:input = on_speed
                />
                <span class = "w-8 tabular-nums">{move || format!("{:.1}", speed.get())}</span>
            </label>
            <button class = BUTTON_CLASS on:click = toggle_rotation>
                {move || if rotating.get() { "Stop Rotation" } else { "Start Rotation" }}
            </button>
            <button class = BUTTON_CLASS on:click = reset_camera>"Reset Camera"</button>
            <span class = "tabular-nums text-gray-600">{move || format!("FPS: {}", fps.get())}</span>
            <span class = "text-gray-800">{move || model_name.get().unwrap_or_default()}</span>
        </div>
    }
}
