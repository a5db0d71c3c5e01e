//! HTTP implementation of [`Transport`].

use std::fs::File;
use std::path::Path;
use std::time::Duration;

use crate::collaborators::{FetchError, Transport};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("slotkeeper/", env!("CARGO_PKG_VERSION"));

/// Blocking HTTP transport backed by `reqwest` with rustls.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Creates a transport with default timeouts.
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(classify)?;
        Ok(Self { client })
    }

    /// Wraps an already configured client.
    pub fn with_client(client: reqwest::blocking::Client) -> Self {
        Self { client }
    }
}

impl Transport for HttpTransport {
    /// Streams the body to a `.part` file and renames it into place on
    /// success.
    fn fetch(&self, url: &str, destination: &Path) -> Result<(), FetchError> {
        let mut response = self.client.get(url).send().map_err(classify)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let mut partial = destination.as_os_str().to_owned();
        partial.push(".part");
        let partial = Path::new(&partial);

        let io_err = |e: std::io::Error| {
            FetchError::Other(format!("cannot write {}: {e}", partial.display()))
        };
        let mut file = File::create(partial).map_err(io_err)?;
        let bytes = match response.copy_to(&mut file) {
            Ok(n) => n,
            Err(e) => {
                drop(file);
                let _ = std::fs::remove_file(partial);
                return Err(classify(e));
            }
        };
        drop(file);
        std::fs::rename(partial, destination).map_err(io_err)?;

        tracing::info!(url, to = %destination.display(), bytes, "download complete");
        Ok(())
    }
}

/// Sorts a reqwest failure into the transport error taxonomy.
fn classify(err: reqwest::Error) -> FetchError {
    let mentions_certificate =
        |e: &dyn std::error::Error| e.to_string().to_ascii_lowercase().contains("certificate");
    let mut source = std::error::Error::source(&err);
    let mut certificate = mentions_certificate(&err);
    while let Some(e) = source {
        certificate |= mentions_certificate(e);
        source = e.source();
    }
    if certificate {
        return FetchError::Certificate(err.to_string());
    }

    if let Some(status) = err.status() {
        FetchError::Status(status.as_u16())
    } else if err.is_connect() || err.is_timeout() || err.is_request() {
        FetchError::Network(err.to_string())
    } else {
        FetchError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    fn transport() -> HttpTransport {
        let client = reqwest::blocking::Client::builder()
            .no_proxy()
            .build()
            .unwrap();
        HttpTransport::with_client(client)
    }

    /// Serves one canned HTTP response and returns the URL to request.
    fn serve_once(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 1024];
            let mut request: Vec<u8> = Vec::new();
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            stream.write_all(response.as_bytes()).unwrap();
        });
        format!("http://{addr}/4242.zip")
    }

    #[test]
    fn fetches_body_into_destination() {
        let url = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello",
        );
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("4242.zip");

        transport().fetch(&url, &dest).unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"hello");
        assert!(!tmp.path().join("4242.zip.part").exists());
    }

    #[test]
    fn non_success_status_is_reported() {
        let url = serve_once("HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("4242.zip");

        let err = transport().fetch(&url, &dest).unwrap_err();
        assert!(matches!(err, FetchError::Status(404)));
        assert!(!dest.exists());
    }

    #[test]
    fn refused_connection_is_a_network_error() {
        // Bind then drop to get a port with nothing listening.
        let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let tmp = tempfile::tempdir().unwrap();

        let err = transport()
            .fetch(&format!("http://127.0.0.1:{port}/x"), &tmp.path().join("x"))
            .unwrap_err();
        assert!(matches!(err, FetchError::Network(_)));
    }
}
