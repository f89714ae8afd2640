pub mod client;
pub mod validate;
