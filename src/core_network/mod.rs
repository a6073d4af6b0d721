pub mod negotiator;
pub mod pasv;
pub mod port;

pub use negotiator::{negotiate, DataMode};
