pub mod memory;
pub mod models;
pub mod rank_repo;

pub use memory::MemoryRankStore;
pub use rank_repo::{PgRankStore, RankStore};
