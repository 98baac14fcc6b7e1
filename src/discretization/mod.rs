pub mod domain;
pub mod generator;
pub mod layout;
pub mod mesh;
