//! The apiclient library provides blocking methods to interact with the appliance management REST
//! API.  See the documentation for submodules [`get`] and [`set`] for JSON helpers.
//!
//! For more control there are also 'raw' methods on the [`ApiClient`] trait.  The trait is the
//! seam callers depend on, so anything that can answer an HTTP-shaped request (a real
//! [`HttpClient`], or a canned fake in tests) can stand in.
//!
//! The `raw_request` method takes a URI relative to the API base URL (including query string), the
//! HTTP method, and any request body data.

use log::{debug, trace};
use snafu::{ensure, OptionExt, ResultExt};
use std::time::Duration;
use url::Url;

pub mod get;
pub mod set;

mod error {
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub enum Error {
        #[snafu(display("Invalid API base URL '{}': {}", url, source))]
        BaseUrl { url: String, source: url::ParseError },

        #[snafu(display("Invalid request URI '{}': {}", uri, source))]
        RequestUri { uri: String, source: url::ParseError },

        #[snafu(display("Invalid HTTP method '{}'", method))]
        RequestMethod { method: String },

        #[snafu(display("Failed to build HTTP client: {}", source))]
        ClientSetup { source: reqwest::Error },

        #[snafu(display("Failed to send {} request to {}: {}", method, uri, source))]
        RequestSend {
            method: String,
            uri: String,
            source: reqwest::Error,
        },

        #[snafu(display("Status {} when {}ing {}: {}", code.as_str(), method, uri, body))]
        ResponseStatus {
            method: String,
            code: http::StatusCode,
            uri: String,
            body: String,
        },

        #[snafu(display("Failed to read body of response: {}", source))]
        ResponseBodyRead { source: reqwest::Error },
    }
}
pub use error::Error;
pub type Result<T> = std::result::Result<T, error::Error>;

/// Something that can answer requests against the management API.
pub trait ApiClient {
    /// Makes an HTTP request without checking the returned status.
    ///
    /// For read-only methods like GET, `data` should be None, otherwise you can use Some(string)
    /// to specify the JSON body of the request.
    ///
    /// If we were able to talk to the server, returns the status code of the response and the
    /// response body as a String.  If we failed to talk to the server, returns Err.
    fn raw_request_unchecked(
        &self,
        uri: &str,
        method: &str,
        data: Option<String>,
    ) -> Result<(http::StatusCode, String)>;

    /// Works like `raw_request_unchecked`, but the management API answers every successful call
    /// with 200, so any other status is returned as an error.
    fn raw_request(
        &self,
        uri: &str,
        method: &str,
        data: Option<String>,
    ) -> Result<(http::StatusCode, String)> {
        let (status, body) = self.raw_request_unchecked(uri, method, data)?;

        ensure!(
            status == http::StatusCode::OK,
            error::ResponseStatusSnafu {
                method,
                code: status,
                uri,
                body,
            }
        );

        Ok((status, body))
    }
}

/// Blocking HTTP(S) client for the management API.
///
/// The session is supplied by whoever constructs the client; it's sent on every request in the
/// session header and never refreshed.
#[derive(Debug)]
pub struct HttpClient {
    base_url: Url,
    session_id: Option<String>,
    client: reqwest::blocking::Client,
}

impl HttpClient {
    pub fn new<S>(
        base_url: S,
        session_id: Option<String>,
        timeout: Duration,
        accept_invalid_certs: bool,
    ) -> Result<Self>
    where
        S: AsRef<str>,
    {
        let base_url = base_url.as_ref();
        let base_url = Url::parse(base_url).context(error::BaseUrlSnafu { url: base_url })?;
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .context(error::ClientSetupSnafu)?;

        Ok(Self {
            base_url,
            session_id,
            client,
        })
    }

    /// Returns the full URL for a URI relative to the API base.
    fn url_for(&self, uri: &str) -> Result<Url> {
        join_uri(&self.base_url, uri)
    }
}

impl ApiClient for HttpClient {
    fn raw_request_unchecked(
        &self,
        uri: &str,
        method: &str,
        data: Option<String>,
    ) -> Result<(http::StatusCode, String)> {
        let url = self.url_for(uri)?;
        let http_method = reqwest::Method::from_bytes(method.as_bytes())
            .ok()
            .context(error::RequestMethodSnafu { method })?;

        debug!("{} {}", method, url);
        let mut request = self
            .client
            .request(http_method, url.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(session_id) = &self.session_id {
            request = request.header(constants::API_SESSION_HEADER, session_id);
        }
        if let Some(data) = data {
            trace!("Request body: {}", data);
            request = request.body(data);
        }

        let response = request.send().context(error::RequestSendSnafu {
            method,
            uri: url.as_str(),
        })?;
        let status = response.status();
        let body = response.text().context(error::ResponseBodyReadSnafu)?;
        trace!("{} {} -> {}", method, url, status);

        Ok((status, body))
    }
}

// The API base usually carries a path prefix ("/rest"), which Url::join would drop for absolute
// URIs, so the two are glued as strings and the result parsed.
fn join_uri(base: &Url, uri: &str) -> Result<Url> {
    let joined = format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        uri.trim_start_matches('/')
    );
    Url::parse(&joined).context(error::RequestUriSnafu { uri })
}
