//! SNMP поллер ONU телеметрии для GPON/EPON OLT.
//!
//! На каждое устройство создаётся [`collector::PollSession`], которая обходит
//! таблицы дескрипторов, оптической мощности, MAC и статуса, нормализует
//! значения по профилю вендора и сохраняет их в [`store::TelemetryStore`].

pub mod collector;
pub mod config;
pub mod error;
pub mod formatter;
pub mod inventory;
pub mod models;
pub mod snmp;
pub mod store;
pub mod telemetry;

pub use error::PollError;
