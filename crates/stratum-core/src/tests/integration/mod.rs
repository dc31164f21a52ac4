#![cfg(test)]

pub mod common;
pub mod event_flow_tests;
pub mod kernel_tests;
pub mod plugin_tests;
