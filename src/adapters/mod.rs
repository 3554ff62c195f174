//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod file_config_adapter;
#[cfg(feature = "http")]
pub mod gemini_adapter;
pub mod json_report_adapter;
pub mod local_narrator;
pub mod sandbox_adapter;
pub mod static_interpreter;
#[cfg(feature = "web")]
pub mod web;
#[cfg(feature = "http")]
pub mod yahoo_adapter;
