mod distribution;
mod farmer;
mod listing;
mod outbox;
mod trade;

pub use distribution::*;
pub use farmer::*;
pub use listing::*;
pub use outbox::*;
pub use trade::*;
