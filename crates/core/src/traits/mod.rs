pub mod script_executor;
pub mod script_store;

pub use script_executor::*;
pub use script_store::*;
