pub mod open_notify;
pub mod sunrise_sunset;
