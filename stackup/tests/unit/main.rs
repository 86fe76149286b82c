//! Unit tests against the public API

mod test_events;
mod test_settings;
mod test_templates;
