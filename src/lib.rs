pub mod config;
pub mod controls;
pub mod environment;
pub mod geometry;
pub mod model;
pub mod render;
pub mod scene;
pub mod stats;
pub mod ui;

pub use ui::{App, ViewerWrapper};
