// src/lib.rs
pub mod catalog;
pub mod config;
pub mod fetch;
pub mod pipeline;
pub mod process;
