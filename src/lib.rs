pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod evaluation;
pub mod geodesy;
pub mod optimizer;
pub mod params;
pub mod queue;
pub mod slots;
pub mod trajectory;
pub mod util;
pub mod workflows;
