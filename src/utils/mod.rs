pub mod format;
pub mod response;
pub mod validation;

pub use format::*;
pub use response::*;
pub use validation::*;
