pub mod commission;
pub mod partner_service;
pub mod settings_service;
pub mod totals_accumulator;
pub mod totals_service;
