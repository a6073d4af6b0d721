use log::{debug, info};
use tokio::net::TcpStream;

use crate::core_control::ControlChannel;
use crate::error::{FtpError, Result};

/// Parses the text of a `227 Entering Passive Mode (h1,h2,h3,h4,p1,p2).`
/// reply into the data-channel endpoint.
///
/// The rule is exact: take the last whitespace-delimited token, strip the
/// trailing period and `)` and the leading `(`, split on commas, and require
/// exactly six numeric fields. Host is the dotted first four, port is
/// `p1 * 256 + p2`.
pub fn parse_pasv_reply(text: &str) -> Result<(String, u16)> {
    let token = text
        .split_whitespace()
        .last()
        .ok_or_else(|| FtpError::Protocol("empty PASV reply".to_string()))?;

    let token = token
        .trim_end_matches('.')
        .trim_end_matches(')')
        .trim_start_matches('(');

    let fields: Vec<&str> = token.split(',').collect();
    if fields.len() != 6 {
        return Err(FtpError::Protocol(format!(
            "PASV reply does not contain six comma-separated fields: {:?}",
            text
        )));
    }

    let numbers: Vec<u16> = fields
        .iter()
        .map(|f| f.parse::<u16>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| {
            FtpError::Protocol(format!("non-numeric field in PASV reply: {:?}", text))
        })?;

    if numbers[..4].iter().any(|&n| n > 255) || numbers[4] > 255 || numbers[5] > 255 {
        return Err(FtpError::Protocol(format!(
            "PASV field out of range: {:?}",
            text
        )));
    }

    let host = format!("{}.{}.{}.{}", numbers[0], numbers[1], numbers[2], numbers[3]);
    let port = numbers[4] * 256 + numbers[5];
    Ok((host, port))
}

/// Sends `PASV` and connects to the endpoint the server advertised.
pub async fn open_passive(control: &mut ControlChannel) -> Result<TcpStream> {
    let reply = control.command("PASV").await?;
    let (host, port) = parse_pasv_reply(&reply.text)?;
    info!("Connecting to data channel at {}:{}", host, port);

    let stream = TcpStream::connect((host.as_str(), port))
        .await
        .map_err(|e| {
            FtpError::Connection(format!(
                "failed to connect data channel to {}:{}: {}",
                host, port, e
            ))
        })?;
    debug!("Passive data connection established");
    Ok(stream)
}
