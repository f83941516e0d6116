//! Route configuration for the Mixer HTTP facade.

pub mod mixer_routes;

pub use mixer_routes::create_routes;
