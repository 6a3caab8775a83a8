//! Loopback stand-ins for a device: an ECP HTTP endpoint and an SSDP responder.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::task::JoinHandle;

use crate::network::device_control::{DeviceAddress, DeviceSession, EcpOptions};

type Routes = Arc<Mutex<HashMap<String, (u16, String)>>>;

/// Minimal HTTP/1.1 server answering canned ECP responses.
///
/// Unrouted requests get a 404. Every request line is recorded as `"METHOD /path"`.
pub struct FakeDevice {
    addr: SocketAddr,
    routes: Routes,
    requests: Arc<Mutex<Vec<String>>>,
    handle: JoinHandle<()>,
}

impl FakeDevice {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let routes: Routes = Arc::new(Mutex::new(HashMap::new()));
        let requests = Arc::new(Mutex::new(Vec::new()));

        let handle = {
            let routes = routes.clone();
            let requests = requests.clone();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let routes = routes.clone();
                    let requests = requests.clone();
                    tokio::spawn(async move {
                        let _ = Self::serve(stream, routes, requests).await;
                    });
                }
            })
        };

        Self {
            addr,
            routes,
            requests,
            handle,
        }
    }

    pub fn route(&self, method: &str, path: &str, status: u16, body: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(format!("{} {}", method, path), (status, body.to_string()));
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn address(&self) -> DeviceAddress {
        DeviceAddress::new("127.0.0.1").unwrap()
    }

    pub fn options(&self) -> EcpOptions {
        EcpOptions {
            port: self.port(),
            timeout: Duration::from_secs(2),
        }
    }

    pub fn session(&self) -> DeviceSession {
        DeviceSession::with_options(self.address(), self.options()).unwrap()
    }

    async fn serve(
        mut stream: TcpStream,
        routes: Routes,
        requests: Arc<Mutex<Vec<String>>>,
    ) -> std::io::Result<()> {
        let mut head = Vec::new();
        let mut buf = [0u8; 1024];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            head.extend_from_slice(&buf[..n]);
        }

        let head = String::from_utf8_lossy(&head);
        let mut parts = head.lines().next().unwrap_or_default().split_whitespace();
        let request = format!(
            "{} {}",
            parts.next().unwrap_or_default(),
            parts.next().unwrap_or_default()
        );
        requests.lock().unwrap().push(request.clone());

        let (status, body) = routes
            .lock()
            .unwrap()
            .get(&request)
            .cloned()
            .unwrap_or((404, String::new()));

        let response = format!(
            "HTTP/1.1 {} Fake\r\nContent-Type: text/xml; charset=\"utf-8\"\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).await?;
        stream.shutdown().await
    }
}

impl Drop for FakeDevice {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// A loopback TCP port with nothing listening on it
pub fn unused_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// UDP responder that answers the first probe it receives with canned datagrams
pub struct FakeResponder {
    pub addr: SocketAddr,
    probe: Arc<Mutex<Option<String>>>,
    handle: JoinHandle<()>,
}

impl FakeResponder {
    pub async fn start(replies: Vec<&str>) -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let probe = Arc::new(Mutex::new(None));
        let replies: Vec<Vec<u8>> = replies.into_iter().map(|r| r.as_bytes().to_vec()).collect();

        let handle = {
            let probe = probe.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                if let Ok((n, from)) = socket.recv_from(&mut buf).await {
                    *probe.lock().unwrap() = Some(String::from_utf8_lossy(&buf[..n]).to_string());
                    for reply in &replies {
                        let _ = socket.send_to(reply, from).await;
                    }
                }
                // Keep the socket open so late probes are not refused
                std::future::pending::<()>().await;
            })
        };

        Self {
            addr,
            probe,
            handle,
        }
    }

    pub fn probe(&self) -> Option<String> {
        self.probe.lock().unwrap().clone()
    }
}

impl Drop for FakeResponder {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
