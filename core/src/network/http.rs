use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, SERVER, WWW_AUTHENTICATE};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tracing::debug;

use crate::network::tcp;
use crate::transport::{
    DeviceRequest, DeviceResponse, DeviceTransport, Method, RequestBody, TransportError,
};

/// [`DeviceTransport`] over HTTP(S) with reqwest.
///
/// Port 443 is spoken as HTTPS; devices ship self-signed certificates, so certificate
/// validation is off. Every other port is plain HTTP. Connection setup has its own
/// deadline so a silent host surfaces as a connect failure, never as a request timeout.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(connect_timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .danger_accept_invalid_certs(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { client })
    }

    fn url(request: &DeviceRequest) -> String {
        let scheme = if request.endpoint.port() == 443 { "https" } else { "http" };
        format!("{scheme}://{}{}", request.endpoint, request.path)
    }
}

#[async_trait]
impl DeviceTransport for HttpTransport {
    async fn is_reachable(&self, addr: SocketAddr, timeout: Duration) -> bool {
        tcp::handshake_probe(addr, timeout).await
    }

    async fn execute(&self, request: DeviceRequest) -> Result<DeviceResponse, TransportError> {
        let url = Self::url(&request);
        debug!("{} {url}", request.method.as_str());

        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        }
        .timeout(request.timeout);

        if let Some(authorization) = &request.authorization {
            builder = builder.header(AUTHORIZATION, authorization);
        }

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Form(fields) => builder.form(&fields),
            RequestBody::Multipart {
                field,
                file_name,
                bytes,
            } => {
                let part = Part::bytes(bytes.as_ref().clone())
                    .file_name(file_name)
                    .mime_str("application/octet-stream")
                    .map_err(map_error)?;
                builder.multipart(Form::new().part(field, part))
            }
        };

        let response = builder.send().await.map_err(map_error)?;

        let status = response.status().as_u16();
        let www_authenticate = response
            .headers()
            .get_all(WWW_AUTHENTICATE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .map(str::to_string)
            .collect();
        let server = response
            .headers()
            .get(SERVER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.map_err(map_error)?;

        Ok(DeviceResponse {
            status,
            www_authenticate,
            server,
            body,
        })
    }
}

// A connect timeout reports both `is_connect` and `is_timeout`.
fn map_error(e: reqwest::Error) -> TransportError {
    if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Other(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn https_only_on_443() {
        let plain = DeviceRequest::get(
            "10.0.0.5:80".parse().unwrap(),
            "/axis-cgi/basicdeviceinfo.cgi",
            Duration::from_secs(1),
        );
        assert_eq!(
            HttpTransport::url(&plain),
            "http://10.0.0.5:80/axis-cgi/basicdeviceinfo.cgi"
        );

        let tls = DeviceRequest::get("10.0.0.5:443".parse().unwrap(), "/x", Duration::from_secs(1));
        assert_eq!(HttpTransport::url(&tls), "https://10.0.0.5:443/x");
    }

    #[tokio::test]
    async fn closed_port_is_a_connect_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = HttpTransport::new(Duration::from_millis(500)).unwrap();
        let request = DeviceRequest::get(addr, "/axis-cgi/basicdeviceinfo.cgi", Duration::from_secs(2));
        let err = transport.execute(request).await.unwrap_err();
        assert!(matches!(err, TransportError::Connect(_)), "{err:?}");
    }
}
