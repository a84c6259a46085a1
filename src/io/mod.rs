pub mod buffer;
pub mod config;
pub mod decode;
pub mod encoding;
pub mod error;
pub mod iter;
pub mod nonblock;
pub mod primitive;
pub mod pushback;
pub mod record;
pub mod stream;

pub use buffer::{DEFAULT_CHUNK_SIZE, DEFAULT_WRITE_BUFFER_SIZE};
pub use config::*;
pub use encoding::*;
pub use error::*;
pub use iter::*;
pub use nonblock::Attempt;
pub use primitive::*;
pub use record::*;
pub use stream::*;
