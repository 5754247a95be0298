mod audio;
mod dex_file;
mod link;
mod logging;
mod pokeapi;
mod transport;

pub use audio::*;
pub use dex_file::*;
pub use link::*;
pub use logging::*;
pub use pokeapi::*;
pub use transport::*;
