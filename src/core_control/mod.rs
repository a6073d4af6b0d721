pub mod control;
pub mod stream;

pub use control::ControlChannel;
pub use stream::FtpSocket;
