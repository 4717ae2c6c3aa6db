mod distribution;
mod grove;
mod ids;
mod listing;
mod trade;
mod transfer;

pub use distribution::*;
pub use grove::*;
pub use ids::*;
pub use listing::*;
pub use trade::*;
pub use transfer::*;
