//! On-disk settings and layout

pub mod layout;
pub mod settings;
