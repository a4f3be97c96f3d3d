pub mod chip;
pub mod compile;
pub mod config;
pub mod drop;
pub mod editor;
pub mod editor_display;
pub mod error;
pub mod palette;
pub mod play;
pub mod render;
pub mod story;
pub mod surface;
pub mod sync;
pub mod telemetry;
pub mod theme;
