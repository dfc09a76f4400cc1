pub mod coerce;
pub mod logger;
