pub mod polling;
pub mod retry;
pub mod telegram;
