//! Library exports for the promotion code generator
//!
//! This module exposes internal components for testing and for the binary.

pub mod config;
pub mod error;
pub mod export;
pub mod generator;
pub mod handler;
pub mod model;
pub mod route;
pub mod state;
pub mod stripe;
