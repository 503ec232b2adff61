pub mod loader;
pub mod vmmap;
