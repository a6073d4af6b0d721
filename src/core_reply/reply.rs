use crate::error::{FtpError, Result};

/// A single FTP control-channel reply: three-digit code plus text.
///
/// Parsing is deliberately single-line: multi-line replies (`211-...`
/// continuations) and replies split across reads are not reassembled. The
/// control channel reads once into a fixed buffer and hands the first line
/// here; this is a known protocol-robustness gap kept on purpose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    pub text: String,
}

impl Reply {
    /// Parses a raw control-channel read into a reply.
    ///
    /// The first three bytes must be ASCII digits; everything after the code
    /// (and one optional separator byte) on the first line becomes the text.
    pub fn parse(raw: &str) -> Result<Reply> {
        let line = raw.lines().next().unwrap_or("").trim_end();
        if line.len() < 3 {
            return Err(FtpError::Protocol(format!(
                "reply too short to carry a code: {:?}",
                raw
            )));
        }
        let (code_str, rest) = line.split_at(3);
        if !code_str.bytes().all(|b| b.is_ascii_digit()) {
            return Err(FtpError::Protocol(format!(
                "reply does not start with a 3-digit code: {:?}",
                line
            )));
        }
        let code: u16 = code_str
            .parse()
            .map_err(|_| FtpError::Protocol(format!("unparsable reply code: {:?}", code_str)))?;
        let text = rest.strip_prefix(' ').unwrap_or(rest).to_string();
        Ok(Reply { code, text })
    }

    /// Positive preliminary reply: the data connection is about to open.
    pub fn is_preliminary(&self) -> bool {
        self.code / 100 == 1
    }

    pub fn is_positive(&self) -> bool {
        matches!(self.code / 100, 1 | 2 | 3)
    }

    pub fn is_failure(&self) -> bool {
        self.code / 100 >= 4
    }
}

impl std::fmt::Display for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.code, self.text)
    }
}
