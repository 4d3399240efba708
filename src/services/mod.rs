pub mod geocode;
pub mod messaging;
pub mod notifications;
pub mod otp;
pub mod ratings;
pub mod storage;
pub mod sync;
pub mod trips;
pub mod users;
