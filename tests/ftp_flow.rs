//! End-to-end client tests against a scripted in-process FTP server.
//!
//! The fake server speaks just enough of the command set for the client's
//! plaintext path (it declines `AUTH TLS`), with real passive-mode data
//! connections over loopback.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use rouilleftps::config::ClientConfig;
use rouilleftps::FtpSession;

#[derive(Default)]
struct ServerState {
    files: HashMap<String, Vec<u8>>,
    dirs: HashSet<String>,
    commands: Vec<String>,
}

type Shared = Arc<Mutex<ServerState>>;

fn join_path(cwd: &[String], name: &str) -> String {
    if cwd.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", cwd.join("/"), name)
    }
}

fn render_listing(state: &Shared, cwd: &[String]) -> String {
    let prefix = if cwd.is_empty() {
        String::new()
    } else {
        format!("{}/", cwd.join("/"))
    };
    let state = state.lock().unwrap();
    let mut listing = String::new();
    for dir in &state.dirs {
        if let Some(name) = dir.strip_prefix(&prefix) {
            if !name.is_empty() && !name.contains('/') {
                listing.push_str(&format!(
                    "drwxr-xr-x 2 ftp ftp 4096 Jan 01 12:00 {}\r\n",
                    name
                ));
            }
        }
    }
    for (file, content) in &state.files {
        if let Some(name) = file.strip_prefix(&prefix) {
            if !name.contains('/') {
                listing.push_str(&format!(
                    "-rw-r--r-- 1 ftp ftp {} Jan 01 12:00 {}\r\n",
                    content.len(),
                    name
                ));
            }
        }
    }
    listing
}

async fn run_fake_server(listener: TcpListener, state: Shared) {
    let (stream, _) = listener.accept().await.unwrap();
    let (read_half, mut control) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    control.write_all(b"220 fake server ready\r\n").await.unwrap();

    let mut cwd: Vec<String> = Vec::new();
    let mut pending_data: Option<TcpListener> = None;
    let mut line = String::new();

    loop {
        line.clear();
        if reader.read_line(&mut line).await.unwrap() == 0 {
            break;
        }
        let command = line.trim_end().to_string();
        state.lock().unwrap().commands.push(command.clone());
        let (verb, arg) = match command.split_once(' ') {
            Some((verb, arg)) => (verb.to_string(), arg.to_string()),
            None => (command.clone(), String::new()),
        };

        match verb.as_str() {
            "AUTH" => control.write_all(b"502 TLS not available\r\n").await.unwrap(),
            "USER" => control.write_all(b"331 need password\r\n").await.unwrap(),
            "PASS" => control.write_all(b"230 logged in\r\n").await.unwrap(),
            "PROT" | "TYPE" => control.write_all(b"200 ok\r\n").await.unwrap(),
            "PASV" => {
                let data_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
                let port = data_listener.local_addr().unwrap().port();
                let reply = format!(
                    "227 Entering Passive Mode (127,0,0,1,{},{}).\r\n",
                    port / 256,
                    port % 256
                );
                pending_data = Some(data_listener);
                control.write_all(reply.as_bytes()).await.unwrap();
            }
            "MKD" => {
                let path = join_path(&cwd, &arg);
                state.lock().unwrap().dirs.insert(path);
                control.write_all(b"257 created\r\n").await.unwrap();
            }
            "CWD" => {
                if arg == ".." {
                    cwd.pop();
                } else {
                    cwd.push(arg.clone());
                }
                control.write_all(b"250 ok\r\n").await.unwrap();
            }
            "SIZE" => {
                let path = join_path(&cwd, &arg);
                let reply = match state.lock().unwrap().files.get(&path) {
                    Some(content) => format!("213 {}\r\n", content.len()),
                    None => "550 not found\r\n".to_string(),
                };
                control.write_all(reply.as_bytes()).await.unwrap();
            }
            "STOR" => {
                let data_listener = pending_data.take().unwrap();
                let (mut data, _) = data_listener.accept().await.unwrap();
                control.write_all(b"150 ok to send\r\n").await.unwrap();
                let mut content = Vec::new();
                data.read_to_end(&mut content).await.unwrap();
                state
                    .lock()
                    .unwrap()
                    .files
                    .insert(join_path(&cwd, &arg), content);
                control.write_all(b"226 stored\r\n").await.unwrap();
            }
            "RETR" => {
                let data_listener = pending_data.take().unwrap();
                let (mut data, _) = data_listener.accept().await.unwrap();
                let content = state
                    .lock()
                    .unwrap()
                    .files
                    .get(&join_path(&cwd, &arg))
                    .cloned();
                match content {
                    Some(content) => {
                        control.write_all(b"150 opening\r\n").await.unwrap();
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        data.write_all(&content).await.unwrap();
                        data.shutdown().await.unwrap();
                        drop(data);
                        control.write_all(b"226 sent\r\n").await.unwrap();
                    }
                    None => control.write_all(b"550 not found\r\n").await.unwrap(),
                }
            }
            "LIST" => {
                let data_listener = pending_data.take().unwrap();
                let (mut data, _) = data_listener.accept().await.unwrap();
                control.write_all(b"150 listing\r\n").await.unwrap();
                tokio::time::sleep(Duration::from_millis(20)).await;
                let listing = render_listing(&state, &cwd);
                data.write_all(listing.as_bytes()).await.unwrap();
                data.shutdown().await.unwrap();
                drop(data);
                control.write_all(b"226 done\r\n").await.unwrap();
            }
            "QUIT" => {
                control.write_all(b"221 bye\r\n").await.unwrap();
                break;
            }
            _ => control.write_all(b"502 not implemented\r\n").await.unwrap(),
        }
    }
}

async fn start_session(state: Shared) -> FtpSession {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(run_fake_server(listener, state));

    let config = ClientConfig {
        host: "127.0.0.1".to_string(),
        port,
        username: "user".to_string(),
        password: "pass".to_string(),
        passive: true,
        connect_timeout_secs: Some(5),
        chunk_size: Some(4096),
        active_data_port: None,
    };
    let mut session = FtpSession::new(&config).unwrap();
    session.connect().await.unwrap();
    assert!(session.login("user", "pass").await.unwrap());
    session
}

#[tokio::test]
async fn upload_then_download_round_trips_byte_identical() {
    let state: Shared = Arc::new(Mutex::new(ServerState::default()));
    let mut session = start_session(Arc::clone(&state)).await;

    let dir = tempfile::tempdir().unwrap();
    let original = dir.path().join("data.bin");
    let payload: Vec<u8> = (0..=u8::MAX).cycle().take(10_000).collect();
    std::fs::write(&original, &payload).unwrap();

    let sent = session.put(&original, "data.bin").await.unwrap();
    assert_eq!(sent, payload.len() as u64);

    let copy = dir.path().join("copy.bin");
    let received = session.get("data.bin", &copy).await.unwrap();
    assert_eq!(received, payload.len() as u64);

    let round_tripped = std::fs::read(&copy).unwrap();
    assert_eq!(round_tripped, payload);
    assert_eq!(
        std::fs::metadata(&copy).unwrap().len(),
        std::fs::metadata(&original).unwrap().len()
    );

    session.quit().await.unwrap();
}

#[tokio::test]
async fn mirroring_a_tree_restores_the_remote_working_directory() {
    let state: Shared = Arc::new(Mutex::new(ServerState::default()));
    let mut session = start_session(Arc::clone(&state)).await;

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), b"alpha").unwrap();
    std::fs::create_dir(dir.path().join("sub")).unwrap();
    std::fs::write(dir.path().join("sub/b.txt"), b"bravo").unwrap();

    session.put_folder(dir.path(), "up").await.unwrap();
    session.quit().await.unwrap();

    let state = state.lock().unwrap();
    assert_eq!(state.files.get("up/a.txt").unwrap(), b"alpha");
    assert_eq!(state.files.get("up/sub/b.txt").unwrap(), b"bravo");
    assert!(state.dirs.contains("up"));
    assert!(state.dirs.contains("up/sub"));

    // Every CWD into a folder is paired with a CWD .. afterward.
    let cwd_in = state
        .commands
        .iter()
        .filter(|c| c.starts_with("CWD") && !c.ends_with(".."))
        .count();
    let cwd_out = state
        .commands
        .iter()
        .filter(|c| c.as_str() == "CWD ..")
        .count();
    assert_eq!(cwd_in, 2);
    assert_eq!(cwd_out, 2);
}

#[tokio::test]
async fn listing_reflects_uploaded_entries() {
    let state: Shared = Arc::new(Mutex::new(ServerState::default()));
    let mut session = start_session(Arc::clone(&state)).await;

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("report.txt");
    std::fs::write(&file, b"quarterly numbers").unwrap();

    session.put(&file, "report.txt").await.unwrap();
    session.mkd("archive").await.unwrap();

    let listing = session.list().await.unwrap();
    assert!(listing.contains("report.txt"));
    assert!(listing.contains("archive"));

    session.quit().await.unwrap();
}

#[tokio::test]
async fn download_folder_rebuilds_the_tree_locally() {
    let state: Shared = Arc::new(Mutex::new(ServerState::default()));
    {
        let mut state = state.lock().unwrap();
        state.dirs.insert("pub".to_string());
        state.dirs.insert("pub/nested".to_string());
        state.files.insert("pub/top.txt".to_string(), b"top".to_vec());
        state
            .files
            .insert("pub/nested/deep.txt".to_string(), b"deep".to_vec());
    }
    let mut session = start_session(Arc::clone(&state)).await;

    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("mirror");
    session.get_folder("pub", &target).await.unwrap();
    session.quit().await.unwrap();

    assert_eq!(std::fs::read(target.join("top.txt")).unwrap(), b"top");
    assert_eq!(
        std::fs::read(target.join("nested/deep.txt")).unwrap(),
        b"deep"
    );
}
