//! Runtime adapters.

pub mod tokio_spawner;

pub use tokio_spawner::{Spawn, TokioSpawner};
