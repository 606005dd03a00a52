pub mod message;
pub mod relay;
