//! Shared fixtures for unit tests.

use std::net::SocketAddr;

use chrono::Utc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::models::{Room, RoomSchedule};

/// A request seen by [`serve_once`].
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    /// Request line and headers
    pub head: String,
    pub body: String,
}

impl CapturedRequest {
    /// The request line, e.g. `POST /api/sheets/update HTTP/1.1`.
    pub fn request_line(&self) -> &str {
        self.head.lines().next().unwrap_or("")
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.eq_ignore_ascii_case(name).then(|| value.trim())
        })
    }
}

/// Split a fully buffered HTTP/1.1 request into head and body.
fn parse_request(buf: &[u8]) -> Option<CapturedRequest> {
    let text = String::from_utf8_lossy(buf);
    let head_end = text.find("\r\n\r\n")?;
    let head = text[..head_end].to_string();
    let length = head
        .lines()
        .skip(1)
        .find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);
    let body = &buf[head_end + 4..];
    (body.len() >= length).then(|| CapturedRequest {
        head,
        body: String::from_utf8_lossy(&body[..length]).into_owned(),
    })
}

/// Accept a single connection, answer it, and hand back what was requested.
pub async fn serve_once(
    status_line: &'static str,
    response_body: impl Into<String>,
) -> (SocketAddr, JoinHandle<CapturedRequest>) {
    let response_body = response_body.into();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let request = loop {
            let n = socket.read(&mut chunk).await.unwrap();
            buf.extend_from_slice(&chunk[..n]);
            if let Some(request) = parse_request(&buf) {
                break request;
            }
            assert!(n > 0, "connection closed before request completed");
        };

        let response = format!(
            "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{response_body}",
            response_body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        request
    });

    (addr, handle)
}

/// Address where nothing is listening.
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

pub fn make_room(number: &str, capacity: u32) -> Room {
    Room {
        number: number.to_string(),
        building: "A".to_string(),
        name: format!("Room {number}"),
        capacity,
        schedule: RoomSchedule::empty(),
        last_decoded_at: Utc::now(),
    }
}

/// A grid with the seven template header rows followed by `rooms`.
///
/// Each entry is `(number, building, name, capacity)`; schedule cells are empty.
pub fn grid_with_rooms(rooms: &[(&str, &str, &str, &str)]) -> Vec<Vec<String>> {
    let mut grid: Vec<Vec<String>> = (0..7).map(|i| vec![format!("template {i}")]).collect();
    for (number, building, name, capacity) in rooms {
        let mut row = vec![String::new(); 75];
        row[1] = number.to_string();
        row[2] = building.to_string();
        row[3] = name.to_string();
        row[4] = capacity.to_string();
        grid.push(row);
    }
    grid
}
