pub mod reference;
pub mod appointment;
pub mod consultant;
pub mod slot;
pub mod feedback;
pub mod quiz;

pub use reference::*;
pub use appointment::*;
pub use consultant::*;
pub use slot::*;
pub use feedback::*;
pub use quiz::*;
