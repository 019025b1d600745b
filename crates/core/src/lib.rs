pub mod alarm;
pub mod config;
pub mod error;
pub mod temporal;

pub use alarm::{Alarm, AlarmStatus, DaySet};
pub use config::Config;
pub use error::ValidationError;
pub use temporal::{ClockTime, TemporalError};
