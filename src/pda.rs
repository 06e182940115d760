pub mod handle;
pub mod navigator;
pub mod panel;
pub mod reply;
pub mod screen;
pub mod status;

pub use handle::*;
pub use navigator::*;
pub use panel::*;
pub use reply::*;
pub use screen::*;
pub use status::*;
