pub mod registry_dto;
pub mod response_dto;

pub use registry_dto::*;
pub use response_dto::*;
