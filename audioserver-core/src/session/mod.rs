pub mod config_cell;
pub mod lifecycle;
pub mod reconfigure;
pub mod server;
pub(crate) mod shared;
pub(crate) mod worker;
