//! Secondary index definitions, their lifecycle and their physical entry format.

mod definition;
mod entry;
pub mod key_codec;
mod state;

pub use definition::*;
pub(crate) use entry::*;
pub use state::IndexState;
