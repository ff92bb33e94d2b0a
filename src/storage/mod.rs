pub mod list;
pub mod partition;
pub mod paths;
pub mod store;
