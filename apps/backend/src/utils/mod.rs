pub mod backoff;
pub mod clock;
pub mod room_code;
