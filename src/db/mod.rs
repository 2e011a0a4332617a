pub mod postgres;

pub use postgres::{PostgresStore, StoredSignal};
