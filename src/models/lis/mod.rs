pub mod cell;
pub mod initial;
pub mod scenario;
