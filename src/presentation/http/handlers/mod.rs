pub mod registry_handler;

pub use registry_handler::RegistryHandler;
