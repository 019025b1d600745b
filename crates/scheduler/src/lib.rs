//! Time-indexed alarm scheduler.
//!
//! An in-memory index keyed by UTC second-of-day plus a once-per-second
//! tick loop. Per-tick work is proportional to the number of alarms due
//! in that second, never to the resident population.

pub mod index;
pub mod tick;

pub use index::{new_shared_index, AlarmProjection, IndexStats, SharedIndex, TimeIndex};
pub use tick::{run_tick_loop, DueHandler, TickConfig};
