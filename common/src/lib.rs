#![allow(clippy::too_many_arguments)]

pub mod api;
pub mod config;
pub mod error;
pub mod share;
pub mod time;
pub mod types;

// Compile time assertion on constants
#[macro_export]
macro_rules! static_assert {
    ($cond:expr $(,)?) => {
        const _: () = assert!($cond);
    };
    ($cond:expr, $msg:literal $(,)?) => {
        const _: () = assert!($cond, $msg);
    };
}
