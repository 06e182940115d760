pub mod command;
pub mod decoder;
pub mod frame;
pub mod key;
pub mod transport;

pub use command::*;
pub use decoder::*;
pub use frame::*;
pub use key::*;
pub use transport::*;
