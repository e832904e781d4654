pub mod send;
pub mod telemetry;
