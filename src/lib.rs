//! Petri 网标识空间搜索：可达性、覆盖性与可行性预检。
pub mod analysis;
pub mod config;
pub mod net;
pub mod options;
pub mod search;
pub mod task;
