pub mod notification;
pub mod session;
pub mod sync;
pub mod trip;
pub mod user;
