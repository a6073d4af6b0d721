use log::debug;
use tokio::net::TcpStream;

use crate::core_control::ControlChannel;
use crate::core_network::{pasv, port};
use crate::error::Result;

/// Data-channel negotiation mode for the next transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataMode {
    Passive,
    Active,
}

/// Establishes the data connection for one transfer and sends the triggering
/// command at the point the chosen mode requires.
///
/// Passive: connect to the server's advertised endpoint, then send the
/// trigger. Active: listen and send `PORT`, send the trigger, then accept the
/// server's connection. Either way the returned socket is connected but not
/// yet TLS-wrapped; the caller still has to read the 150 reply.
pub async fn negotiate(
    control: &mut ControlChannel,
    mode: DataMode,
    active_port: u16,
    trigger: &str,
) -> Result<TcpStream> {
    match mode {
        DataMode::Passive => {
            let stream = pasv::open_passive(control).await?;
            control.send_command(trigger).await?;
            Ok(stream)
        }
        DataMode::Active => {
            let listener = port::open_active(control, active_port).await?;
            control.send_command(trigger).await?;
            debug!("Waiting for server data connection");
            // The listener is dropped (closed) once the connection is in.
            port::accept_active_connection(listener).await
        }
    }
}
