mod error;
mod health;
mod session;
mod stream;

pub use error::*;
pub use health::*;
pub use session::*;
pub use stream::*;
