//! In-world event feed: types and the broadcast bus

mod bus;
mod types;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus};
pub use types::{ActorInfo, GameEvent};
