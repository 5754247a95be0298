mod catalog;
mod framer;
mod protocol;
mod types;

pub use catalog::*;
pub use framer::*;
pub use protocol::*;
pub use types::*;
