pub mod aggregate;
pub mod errors;
pub mod events;
pub mod message;
pub mod table;
pub mod value_objects;

pub use aggregate::*;
pub use errors::*;
pub use events::*;
pub use message::{Headers, Message};
pub use table::*;
pub use value_objects::*;
