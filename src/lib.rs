pub mod canvas;
pub mod config;
pub mod console_display;
pub mod coordinator;
pub mod error;
pub mod frame_mode;
pub mod geo;
pub mod input;
pub mod jsonl_reader;
pub mod layout;
pub mod overlay;
pub mod recorder;
pub mod render;
pub mod simulator;
pub mod surface;
pub mod telemetry_form;
pub mod track_store;
pub mod types;

#[cfg(feature = "gui")]
pub mod window;
