//! Command handlers.

mod ask;
mod chunks;
mod session;
mod similar;

pub use ask::AskCommand;
pub use chunks::ChunksCommand;
pub use similar::SimilarCommand;

pub(crate) use session::Session;
