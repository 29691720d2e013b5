// Library surface for the terminal binary, headless runs and integration tests.
// Terminal rendering stays in the binary.
pub mod analysis;
pub mod app_dirs;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod history;
pub mod level;
pub mod library;
pub mod markers;
pub mod recommend;
pub mod recorder;
pub mod runtime;
pub mod script;
pub mod session;
pub mod store;
pub mod time_series;
pub mod trainer;
pub mod util;

pub use error::TrainerError;
pub use trainer::Trainer;
