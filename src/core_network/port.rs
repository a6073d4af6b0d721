use std::net::IpAddr;

use log::{debug, info};
use tokio::net::{TcpListener, TcpStream};

use crate::core_control::ControlChannel;
use crate::error::{FtpError, Result};

/// Builds the `PORT h1,h2,h3,h4,p1,p2` command for a local IPv4 endpoint.
pub fn format_port_command(ip: IpAddr, port: u16) -> Result<String> {
    let v4 = match ip {
        IpAddr::V4(v4) => v4,
        IpAddr::V6(_) => {
            return Err(FtpError::Protocol(
                "active mode requires an IPv4 local address".to_string(),
            ))
        }
    };
    let [h1, h2, h3, h4] = v4.octets();
    Ok(format!(
        "PORT {},{},{},{},{},{}",
        h1,
        h2,
        h3,
        h4,
        port / 256,
        port % 256
    ))
}

/// Sets up active (PORT) mode: listens on the fixed local data port and tells
/// the server where to connect. Requires a 200 reply.
///
/// The actual data connection is accepted later, after the triggering command
/// (`LIST`/`STOR`/`RETR`) has been sent.
pub async fn open_active(control: &mut ControlChannel, local_port: u16) -> Result<TcpListener> {
    let listener = TcpListener::bind(("0.0.0.0", local_port))
        .await
        .map_err(|e| {
            FtpError::Connection(format!(
                "failed to listen on local data port {}: {}",
                local_port, e
            ))
        })?;

    let local_ip = control.local_addr().ip();
    let command = format_port_command(local_ip, local_port)?;
    let reply = control.command(&command).await?;
    if reply.code != 200 {
        return Err(FtpError::Protocol(format!(
            "server refused PORT command: {}",
            reply
        )));
    }

    info!(
        "Listening for data connection at {}:{}",
        local_ip, local_port
    );
    Ok(listener)
}

/// Accepts the server's incoming data connection on the active listener.
pub async fn accept_active_connection(listener: TcpListener) -> Result<TcpStream> {
    let (stream, addr) = listener
        .accept()
        .await
        .map_err(|e| FtpError::Connection(format!("failed to accept data connection: {}", e)))?;
    debug!("Accepted data connection from {}", addr);
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_port_command() {
        let ip: IpAddr = "192.168.1.5".parse().unwrap();
        assert_eq!(
            format_port_command(ip, 10806).unwrap(),
            "PORT 192,168,1,5,42,54"
        );
    }

    #[test]
    fn splits_port_into_high_and_low_bytes() {
        let ip: IpAddr = "10.0.0.1".parse().unwrap();
        assert_eq!(format_port_command(ip, 256).unwrap(), "PORT 10,0,0,1,1,0");
        assert_eq!(format_port_command(ip, 21).unwrap(), "PORT 10,0,0,1,0,21");
    }

    #[test]
    fn rejects_ipv6_local_address() {
        let ip: IpAddr = "::1".parse().unwrap();
        assert!(format_port_command(ip, 10806).is_err());
    }
}
