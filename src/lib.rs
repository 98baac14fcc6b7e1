//! Residual, discretization and event core of a one-dimensional
//! lithium-sulfur cell model, with a reference implicit integrator and a
//! constant-current scenario driver.

pub mod chemistry;
pub mod config;
pub mod discretization;
pub mod error;
pub mod models;
pub mod numerics;
pub mod physics;
pub mod processing;
