pub mod registry;

pub use registry::SpotRegistry;
