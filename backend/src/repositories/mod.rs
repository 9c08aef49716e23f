pub mod attendance_store;
pub mod config_store;
pub mod memory;
pub mod postgres;

pub use attendance_store::{transition, AggregateUpdate, AttendanceStore};
pub use config_store::{ConfigStore, PgConfigStore, StaticConfigStore};
pub use memory::MemoryAttendanceStore;
pub use postgres::PgAttendanceStore;

#[cfg(test)]
pub use config_store::MockConfigStore;
