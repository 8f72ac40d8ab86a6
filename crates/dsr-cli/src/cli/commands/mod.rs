//! CLI command handlers, grouped by what they touch.

mod crud;
mod inspect;
mod transaction;

pub use crud::{run_create, run_delete, run_read, run_update};
pub use inspect::{run_classify, run_policies};
pub use transaction::{run_demo, run_transaction};
