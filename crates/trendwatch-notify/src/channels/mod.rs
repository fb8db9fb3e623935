pub mod telegram;
pub mod webhook;
