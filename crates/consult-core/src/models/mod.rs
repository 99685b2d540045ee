pub mod action;
pub mod session;
pub mod turn;

pub use action::*;
pub use session::*;
pub use turn::*;
