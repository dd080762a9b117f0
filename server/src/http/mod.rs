pub mod backfill;
pub mod health;
pub mod routes;
