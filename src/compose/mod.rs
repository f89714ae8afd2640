pub mod glow;
pub mod lineup;
