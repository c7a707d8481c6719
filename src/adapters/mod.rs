pub mod clock;
pub mod json_codec;
pub mod memory;
pub mod postgres;
pub mod table;

pub use clock::{ManualClock, SystemClock};
pub use json_codec::JsonCodec;
