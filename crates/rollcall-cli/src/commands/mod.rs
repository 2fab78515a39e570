pub mod check;
pub mod common;
pub mod list;
pub mod status;
pub mod subject;
pub mod sync;
pub mod watch;
