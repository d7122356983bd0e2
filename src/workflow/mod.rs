pub mod tab_agent;

pub use tab_agent::{form_fields, outcome_from_marker, FormField, TabAgent};
