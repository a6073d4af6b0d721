pub mod upgrader;

pub use upgrader::TlsUpgrader;
