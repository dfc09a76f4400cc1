pub mod partner_repository;
pub mod settings_repository;
pub mod totals_repository;
