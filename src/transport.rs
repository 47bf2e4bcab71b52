use async_trait::async_trait;
use reqwest::{redirect, Certificate, Identity, Method, Proxy};

use crate::{
    options::{Auth, Body, ClientCert, ProxyRule, ProxyScope, RequestParams, Timeout, Verify},
    Error, Response, Result,
};

/// Redirects followed before giving up, when redirects are allowed.
pub const MAX_REDIRECTS: usize = 30;

/// One logical request, ready for the transport.
#[derive(Clone, Debug, PartialEq)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: String,
    /// `None` waits forever.
    pub timeout: Option<Timeout>,
    pub params: RequestParams,
}

/// Issues a single physical attempt.
///
/// Retries are layered on top by [`RetryAdapter`](crate::RetryAdapter); a transport
/// only sends.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &PreparedRequest) -> Result<Response>;
}

/// [`Transport`] backed by `reqwest`.
///
/// Client-level settings (timeouts, redirects, proxies, TLS) come from each request,
/// so a client is built per attempt and dropped with it.
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport;

impl ReqwestTransport {
    pub fn new() -> Self {
        Self
    }

    async fn client_for(request: &PreparedRequest) -> Result<reqwest::Client> {
        let params = &request.params;
        let redirects = if params.allow_redirects.unwrap_or(true) {
            redirect::Policy::limited(MAX_REDIRECTS)
        } else {
            redirect::Policy::none()
        };
        let mut builder = reqwest::Client::builder().redirect(redirects);

        if let Some(timeout) = request.timeout {
            builder = builder
                .connect_timeout(timeout.connect())
                .read_timeout(timeout.read());
        }

        for rule in &params.proxies {
            builder = builder.proxy(to_proxy(rule)?);
        }

        match &params.verify {
            Verify::Enabled => {}
            Verify::Disabled => builder = builder.danger_accept_invalid_certs(true),
            Verify::CaBundle(path) => {
                let pem = tokio::fs::read(path).await?;
                for cert in Certificate::from_pem_bundle(&pem).map_err(Error::Transport)? {
                    builder = builder.add_root_certificate(cert);
                }
            }
        }

        if let Some(cert) = &params.cert {
            let pem = match cert {
                ClientCert::Pem(path) => tokio::fs::read(path).await?,
                ClientCert::Pair { cert, key } => {
                    let mut pem = tokio::fs::read(key).await?;
                    pem.push(b'\n');
                    pem.extend(tokio::fs::read(cert).await?);
                    pem
                }
            };
            builder = builder.identity(Identity::from_pem(&pem).map_err(Error::Transport)?);
        }

        builder.build().map_err(Error::Transport)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &PreparedRequest) -> Result<Response> {
        let client = Self::client_for(request).await?;
        let params = &request.params;

        let mut builder = client
            .request(request.method.clone(), &request.url)
            .headers(params.headers.clone());
        if !params.query.is_empty() {
            builder = builder.query(&params.query);
        }
        builder = match &params.body {
            Body::Empty => builder,
            Body::Bytes(bytes) => builder.body(bytes.clone()),
            Body::Form(fields) => builder.form(fields),
            Body::Json(value) => builder.json(value),
        };
        builder = match &params.auth {
            None => builder,
            Some(Auth::Basic { username, password }) => {
                builder.basic_auth(username, password.as_ref())
            }
            Some(Auth::Bearer(token)) => builder.bearer_auth(token),
        };

        let response = builder.send().await.map_err(Error::Transport)?;
        Response::from_reqwest(response).await
    }
}

fn to_proxy(rule: &ProxyRule) -> Result<Proxy> {
    let proxy = match rule.scope {
        ProxyScope::Http => Proxy::http(&rule.url),
        ProxyScope::Https => Proxy::https(&rule.url),
        ProxyScope::All => Proxy::all(&rule.url),
    };
    proxy.map_err(Error::Transport)
}
