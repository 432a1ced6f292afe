//! HTTP transports for the two outbound legs: calls into the TEA and
//! update delivery to intelligent agents.

use std::time::Duration;

use async_trait::async_trait;
use nodeagent_core::{DeliveryError, DeliveryTarget, UpdateDelivery};
use nodeagent_rtml::RtmlDocument;
use nodeagent_tea::{RemoteError, TeaEndpoint, TeaOperation};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::debug;
use url::Url;

/// Content type of RTML bodies.
pub const RTML_CONTENT_TYPE: &str = "text/xml; charset=ISO-8859-1";

/// TEA request handler reached over HTTP.
///
/// Each operation is a POST of the serialized document to
/// `<base>/<method name>`, answered with the reply document. Bodies are
/// encoded and decoded as their XML declaration says, whatever the
/// `Content-Type` charset.
#[derive(Debug, Clone)]
pub struct HttpTeaEndpoint {
    base: Url,
    client: Client,
}

impl HttpTeaEndpoint {
    /// Creates an endpoint rooted at `base`.
    ///
    /// # Errors
    ///
    /// Fails if `base` is not a URL or the HTTP client cannot be built.
    pub fn new(base: &str, timeout: Duration) -> anyhow::Result<Self> {
        let mut base = Url::parse(base)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { base, client })
    }

    /// URL an operation is posted to.
    pub fn operation_url(&self, operation: TeaOperation) -> Result<Url, url::ParseError> {
        self.base.join(operation.method_name())
    }
}

#[async_trait]
impl TeaEndpoint for HttpTeaEndpoint {
    async fn call(
        &self,
        operation: TeaOperation,
        document: RtmlDocument,
    ) -> Result<RtmlDocument, RemoteError> {
        let url = self
            .operation_url(operation)
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        let body = document
            .to_xml_bytes()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        debug!(url = %url, "posting document to TEA");
        let resp = self
            .client
            .post(url)
            .header(CONTENT_TYPE, RTML_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(RemoteError::Remote(format!(
                "{} {}",
                status,
                String::from_utf8_lossy(&bytes)
            )));
        }
        RtmlDocument::parse_bytes(&bytes).map_err(|e| RemoteError::InvalidReply(e.to_string()))
    }
}

/// Delivers updates by POSTing them to the agent.
#[derive(Debug, Clone)]
pub struct HttpDelivery {
    client: Client,
}

impl HttpDelivery {
    /// Creates a delivery transport.
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

/// URL an update for `target` is posted to.
///
/// # Errors
///
/// Returns [`DeliveryError::InvalidTarget`] for targets that are not
/// HTTP URLs.
pub fn delivery_url(target: &DeliveryTarget) -> Result<Url, DeliveryError> {
    let raw = match target {
        DeliveryTarget::HostPort { host, port } => format!("http://{}:{}/", host, port),
        DeliveryTarget::Uri(uri) => uri.clone(),
    };
    let url = Url::parse(&raw).map_err(|e| DeliveryError::InvalidTarget(format!("{}: {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(DeliveryError::InvalidTarget(format!(
            "{}: unsupported scheme {}",
            raw, other
        ))),
    }
}

#[async_trait]
impl UpdateDelivery for HttpDelivery {
    async fn deliver(
        &self,
        target: &DeliveryTarget,
        document: &RtmlDocument,
    ) -> Result<(), DeliveryError> {
        let url = delivery_url(target)?;
        let body = document.to_xml_bytes().map_err(DeliveryError::Serialize)?;

        let resp = self
            .client
            .post(url)
            .header(CONTENT_TYPE, RTML_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_urls() {
        let endpoint = HttpTeaEndpoint::new("http://tea:8080/ea", Duration::from_secs(1)).unwrap();
        assert_eq!(
            endpoint.operation_url(TeaOperation::Score).unwrap().as_str(),
            "http://tea:8080/ea/handleScore"
        );
        assert_eq!(
            endpoint.operation_url(TeaOperation::Abort).unwrap().as_str(),
            "http://tea:8080/ea/handleAbort"
        );
    }

    #[test]
    fn test_delivery_urls() {
        let host_port = DeliveryTarget::HostPort {
            host: "ia.example.org".to_string(),
            port: 8000,
        };
        assert_eq!(
            delivery_url(&host_port).unwrap().as_str(),
            "http://ia.example.org:8000/"
        );

        let uri = DeliveryTarget::Uri("https://ia.example.org/rtml".to_string());
        assert_eq!(delivery_url(&uri).unwrap().as_str(), "https://ia.example.org/rtml");

        let ftp = DeliveryTarget::Uri("ftp://ia.example.org/".to_string());
        assert!(matches!(
            delivery_url(&ftp),
            Err(DeliveryError::InvalidTarget(_))
        ));
    }
}
