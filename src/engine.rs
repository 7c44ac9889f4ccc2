mod debounce;
mod detector;
mod state;
mod types;

#[cfg(test)]
mod tests;

pub use state::EngineState;
pub use types::Alert;

use std::sync::Arc;
use tokio::sync::Mutex;

pub type SharedEngine = Arc<Mutex<EngineState>>;

pub fn shared(state: EngineState) -> SharedEngine {
    Arc::new(Mutex::new(state))
}
