mod booking;
mod notification;
mod subject;
mod transaction;
mod user;

pub use booking::*;
pub use notification::*;
pub use subject::*;
pub use transaction::*;
pub use user::*;
