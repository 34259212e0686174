//! Store access for the VitalSign API: patient document queries and the
//! polling change feed built on them.

pub mod change_feed;
pub mod error;
pub mod patient_data;

pub use change_feed::PollingChangeFeed;
