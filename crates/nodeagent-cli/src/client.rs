//! Companion client: pings a node agent or sends it one RTML document.
//!
//! | Exit code | Meaning |
//! |-----------|---------|
//! | 0 | success |
//! | 1 | the endpoint could not be created |
//! | 2 | the call failed |
//! | 3 | the input or output file could not be used |
//! | 6 | neither `--ping` nor `--handle-rtml` was given |
//! | 7 | the arguments did not parse |

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use nodeagent_core::{PASSWORD_HEADER, USERNAME_HEADER};
use nodeagent_rtml::{decode_document, encode_document};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::server::{HANDLE_RTML_PATH, PING_PATH};
use crate::transport::RTML_CONTENT_TYPE;

const CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Command line of `nodeagent-client`.
#[derive(Debug, Clone, Parser)]
#[command(name = "nodeagent-client")]
#[command(about = "Send RTML documents to a node agent")]
pub struct ClientArgs {
    /// Node agent host
    #[arg(long, default_value = "localhost")]
    pub host: String,

    /// Node agent port
    #[arg(long, default_value_t = 8080)]
    pub port: u16,

    /// User name sent in the Username header
    #[arg(long)]
    pub username: Option<String>,

    /// Password sent in the Password header
    #[arg(long)]
    pub password: Option<String>,

    /// Ping the node agent
    #[arg(long, conflicts_with = "handle_rtml")]
    pub ping: bool,

    /// Send the RTML document in FILE
    #[arg(long, value_name = "FILE")]
    pub handle_rtml: Option<PathBuf>,

    /// Write the reply to FILE instead of stdout
    #[arg(long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Client failure, one variant per exit code.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The endpoint URL or HTTP client could not be created.
    #[error("failed to create endpoint: {0}")]
    Endpoint(String),

    /// The request failed or was refused.
    #[error("call failed: {0}")]
    Call(String),

    /// A file could not be read or written.
    #[error("file error on {}: {source}", path.display())]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// No operation was selected.
    #[error("no endpoint selected: use --ping or --handle-rtml")]
    NoOperation,

    /// The command line did not parse.
    #[error("{0}")]
    Args(String),
}

impl ClientError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Endpoint(_) => 1,
            Self::Call(_) => 2,
            Self::Io { .. } => 3,
            Self::NoOperation => 6,
            Self::Args(_) => 7,
        }
    }
}

/// HTTP client for one node agent.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    base: Url,
    client: Client,
    username: Option<String>,
    password: Option<String>,
}

impl GatewayClient {
    /// Creates a client for `http://host:port`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Endpoint`] if the address is not usable.
    pub fn new(
        host: &str,
        port: u16,
        username: Option<String>,
        password: Option<String>,
    ) -> Result<Self, ClientError> {
        let base = Url::parse(&format!("http://{}:{}/", host, port))
            .map_err(|e| ClientError::Endpoint(format!("{}:{}: {}", host, port, e)))?;
        let client = Client::builder()
            .timeout(CALL_TIMEOUT)
            .build()
            .map_err(|e| ClientError::Endpoint(e.to_string()))?;
        Ok(Self {
            base,
            client,
            username,
            password,
        })
    }

    /// Calls `ping`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Call`] on transport failure or a non-2xx reply.
    pub async fn ping(&self) -> Result<String, ClientError> {
        let url = self.url(PING_PATH)?;
        let reply = self.send(self.client.get(url)).await?;
        Ok(String::from_utf8_lossy(&reply).into_owned())
    }

    /// Calls `handle_rtml` with `rtml` and returns the reply document.
    ///
    /// The document travels in the encoding its declaration names.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Call`] on transport failure or a non-2xx reply.
    pub async fn handle_rtml(&self, rtml: String) -> Result<String, ClientError> {
        let url = self.url(HANDLE_RTML_PATH)?;
        let request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, RTML_CONTENT_TYPE)
            .body(encode_document(&rtml));
        let reply = self.send(request).await?;
        Ok(decode_document(&reply))
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        self.base
            .join(path)
            .map_err(|e| ClientError::Endpoint(e.to_string()))
    }

    async fn send(&self, mut request: RequestBuilder) -> Result<Vec<u8>, ClientError> {
        if let Some(username) = &self.username {
            request = request.header(USERNAME_HEADER, username);
        }
        if let Some(password) = &self.password {
            request = request.header(PASSWORD_HEADER, password);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| ClientError::Call(e.to_string()))?;
        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .map_err(|e| ClientError::Call(e.to_string()))?;
        if status.is_success() {
            Ok(body.to_vec())
        } else {
            Err(ClientError::Call(format!(
                "{}: {}",
                status,
                String::from_utf8_lossy(&body)
            )))
        }
    }
}

/// Parses the command line, mapping parse failures to exit code 7.
///
/// `--help` and `--version` are printed and reported as `Ok(None)`.
pub fn parse_args<I, T>(args: I) -> Result<Option<ClientArgs>, ClientError>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    match ClientArgs::try_parse_from(args) {
        Ok(args) => Ok(Some(args)),
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                let _ = err.print();
                Ok(None)
            }
            _ => Err(ClientError::Args(err.render().to_string())),
        },
    }
}

/// Runs the selected operation.
///
/// # Errors
///
/// See [`ClientError`] for the failure classes.
pub async fn run(args: ClientArgs) -> Result<(), ClientError> {
    if !args.ping && args.handle_rtml.is_none() {
        return Err(ClientError::NoOperation);
    }

    let client = GatewayClient::new(
        &args.host,
        args.port,
        args.username.clone(),
        args.password.clone(),
    )?;
    debug!(host = %args.host, port = args.port, "endpoint created");

    let reply = match &args.handle_rtml {
        Some(path) => {
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|source| ClientError::Io {
                    path: path.clone(),
                    source,
                })?;
            let rtml = decode_document(&bytes);
            info!(file = %path.display(), "sending document");
            client.handle_rtml(rtml).await?
        }
        None => client.ping().await?,
    };

    match &args.output {
        Some(path) => tokio::fs::write(path, encode_document(&reply))
            .await
            .map_err(|source| ClientError::Io {
                path: path.clone(),
                source,
            })?,
        None => println!("{}", reply),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(ClientError::Endpoint(String::new()).exit_code(), 1);
        assert_eq!(ClientError::Call(String::new()).exit_code(), 2);
        assert_eq!(ClientError::NoOperation.exit_code(), 6);
        assert_eq!(ClientError::Args(String::new()).exit_code(), 7);
    }

    #[test]
    fn test_defaults() {
        let args = parse_args(["nodeagent-client", "--ping"]).unwrap().unwrap();
        assert_eq!(args.host, "localhost");
        assert_eq!(args.port, 8080);
        assert!(args.ping);
    }

    #[test]
    fn test_bad_arguments() {
        let err = parse_args(["nodeagent-client", "--port", "eighty"]).unwrap_err();
        assert_eq!(err.exit_code(), 7);

        let err = parse_args(["nodeagent-client", "--ping", "--handle-rtml", "x.rtml"]).unwrap_err();
        assert_eq!(err.exit_code(), 7);
    }

    #[tokio::test]
    async fn test_no_operation() {
        let args = parse_args(["nodeagent-client"]).unwrap().unwrap();
        assert_eq!(run(args).await.unwrap_err().exit_code(), 6);
    }

    #[tokio::test]
    async fn test_missing_input_file() {
        let args = parse_args([
            "nodeagent-client",
            "--handle-rtml",
            "/nonexistent/request.rtml",
        ])
        .unwrap()
        .unwrap();
        assert_eq!(run(args).await.unwrap_err().exit_code(), 3);
    }

    #[test]
    fn test_invalid_host() {
        let err = GatewayClient::new("bad host", 80, None, None).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }
}
