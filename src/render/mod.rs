pub mod blur;
pub mod composite;
pub mod decorate;
pub mod shape;
pub mod text;
