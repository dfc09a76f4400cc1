pub mod partner;
pub mod settings;
pub mod totals;
