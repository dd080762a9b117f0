pub mod arrange;
pub mod draft;
pub mod ranking;
pub mod registry;
pub mod room;
pub mod scoring;
pub mod session;
pub mod types;
