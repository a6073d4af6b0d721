use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use log::{info, warn};

use crate::error::{FtpError, Result};
use crate::session::FtpSession;

/// One parsed line of a `LIST` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub name: String,
    pub is_dir: bool,
}

/// Parses a Unix `ls -l`-style LIST line.
///
/// Format assumption (a compatibility constraint of this client): at least
/// nine whitespace-delimited fields, the leading character of the first field
/// is `d` for directories, and the name starts at the ninth field (joined
/// back together so names with spaces survive).
pub fn parse_list_line(line: &str) -> Option<ListEntry> {
    let line = line.trim_end();
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 9 {
        return None;
    }
    let is_dir = fields[0].starts_with('d');
    let name = fields[8..].join(" ");
    if name.is_empty() {
        return None;
    }
    Some(ListEntry { name, is_dir })
}

/// Recursively mirrors a local directory tree to the server.
///
/// Creates the remote directory, changes into it, uploads files (each one
/// scan-gated by the session) and recurses into subdirectories. Child
/// failures are logged and skipped; `CWD ..` is always issued afterward so
/// the remote working directory is restored.
pub fn upload_folder<'a>(
    session: &'a mut FtpSession,
    local: &'a Path,
    remote: &'a str,
) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
    Box::pin(async move {
        let metadata = tokio::fs::metadata(local)
            .await
            .map_err(|e| FtpError::FileSystem(format!("cannot stat {}: {}", local.display(), e)))?;
        if !metadata.is_dir() {
            return Err(FtpError::FileSystem(format!(
                "not a local directory: {}",
                local.display()
            )));
        }

        // MKD may fail if the directory already exists; logged, not fatal.
        if let Err(e) = session.mkd(remote).await {
            warn!("MKD {} failed (continuing): {}", remote, e);
        }
        session.cwd(remote).await?;
        info!("Mirroring {} -> {}", local.display(), remote);

        let mut entries = tokio::fs::read_dir(local)
            .await
            .map_err(|e| FtpError::FileSystem(format!("cannot read {}: {}", local.display(), e)))?;

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!("Error iterating {}: {}", local.display(), e);
                    break;
                }
            };
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();

            let file_type = match entry.file_type().await {
                Ok(file_type) => file_type,
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    continue;
                }
            };
            let child_result = if file_type.is_dir() {
                upload_folder(session, &path, &name).await
            } else {
                session.put(&path, &name).await.map(|_| ())
            };
            if let Err(e) = child_result {
                warn!("Skipping {}: {}", path.display(), e);
            }
        }

        // Restore the remote working directory even after partial failure.
        session.cwd("..").await?;
        Ok(())
    })
}

/// Recursively mirrors a remote directory tree into a local path.
///
/// Walks the `LIST` output line by line; entries whose lines do not match the
/// expected format are skipped.
pub fn download_folder<'a>(
    session: &'a mut FtpSession,
    remote: &'a str,
    local: &'a Path,
) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
    Box::pin(async move {
        session.cwd(remote).await?;
        tokio::fs::create_dir_all(local).await.map_err(|e| {
            FtpError::FileSystem(format!("cannot create {}: {}", local.display(), e))
        })?;
        info!("Mirroring {} -> {}", remote, local.display());

        let listing = match session.list().await {
            Ok(listing) => listing,
            Err(e) => {
                session.cwd("..").await?;
                return Err(e);
            }
        };

        for line in listing.lines() {
            let entry = match parse_list_line(line) {
                Some(entry) => entry,
                None => continue,
            };
            if entry.name == "." || entry.name == ".." {
                continue;
            }

            let target = local.join(&entry.name);
            let child_result = if entry.is_dir {
                download_folder(session, &entry.name, &target).await
            } else {
                session.get(&entry.name, &target).await.map(|_| ())
            };
            if let Err(e) = child_result {
                warn!("Skipping {}: {}", entry.name, e);
            }
        }

        session.cwd("..").await?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_file_line() {
        let entry =
            parse_list_line("-rw-r--r-- 1 ftp ftp 1024 Jan 01 12:00 report.pdf").unwrap();
        assert_eq!(entry.name, "report.pdf");
        assert!(!entry.is_dir);
    }

    #[test]
    fn parses_directory_line() {
        let entry = parse_list_line("drwxr-xr-x 2 ftp ftp 4096 Jan 01 12:00 sub").unwrap();
        assert_eq!(entry.name, "sub");
        assert!(entry.is_dir);
    }

    #[test]
    fn keeps_names_containing_spaces() {
        let entry =
            parse_list_line("-rw-r--r-- 1 ftp ftp 10 Jan 01 12:00 my holiday photos.zip")
                .unwrap();
        assert_eq!(entry.name, "my holiday photos.zip");
    }

    #[test]
    fn rejects_lines_with_too_few_fields() {
        assert!(parse_list_line("total 12").is_none());
        assert!(parse_list_line("").is_none());
        assert!(parse_list_line("-rw-r--r-- 1 ftp ftp 10").is_none());
    }

    #[test]
    fn dot_entries_parse_and_are_filtered_by_the_walker() {
        let entry = parse_list_line("drwxr-xr-x 2 ftp ftp 4096 Jan 01 12:00 .").unwrap();
        assert_eq!(entry.name, ".");
        assert!(entry.is_dir);
    }
}
