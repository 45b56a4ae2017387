//! Configuration management
//!
//! Process settings layered from defaults, an optional TOML file and
//! `DATUM_*` environment variables, and the per-chain parameters derived
//! from them.

pub mod settings;

pub use settings::Settings;
