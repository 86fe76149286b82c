//! Background workers

pub mod event_tailer;
