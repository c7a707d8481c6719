pub mod inbox;
pub mod repository;
