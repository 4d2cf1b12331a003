pub mod hooks;
pub mod query;
pub mod version;
