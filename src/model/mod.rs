pub mod history;
pub mod quote;
pub mod snapshot;

pub use history::HistoryRecord;
pub use quote::Quote;
pub use snapshot::{percent_change, round2, Snapshot};
