pub mod render;
mod view_core;
mod view_data;
pub mod viewer;
