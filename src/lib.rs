pub mod aqualink;
pub mod bus_settings;
pub mod emulator;
pub mod pda;

pub use bus_settings::*;
pub use emulator::*;
