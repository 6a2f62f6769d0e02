pub mod checksum;
pub mod error;
pub mod provision;
pub mod secrets;
