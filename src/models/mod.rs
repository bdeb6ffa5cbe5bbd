pub mod resource;
pub mod translation;

pub use resource::*;
pub use translation::*;
