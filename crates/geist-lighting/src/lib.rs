//! Sunlight and colored lamp light: flood-fill addition and removal inside a
//! chunk, with cross-chunk work carried as messages.
#![forbid(unsafe_code)]

mod engine;
mod message;
mod propagate;
mod table;

pub use engine::{LightEngine, SettleReport};
pub use geist_chunk::{LampColor, LightComponent, LightNode, LightQueues, MAX_LIGHT};
pub use message::LightMessage;
pub use propagate::{Propagation, apply_message, initial_light, on_block_changed, propagate, sky_exposed, transmit};
pub use table::{LightProps, LightTable};

#[cfg(test)]
mod tests;
