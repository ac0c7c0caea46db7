pub mod resource;
pub mod task;

pub use resource::*;
pub use task::*;
