use crate::ApiClient;
use snafu::ResultExt;

/// Fetches the given URI from the API and returns the result as an untyped Value.
pub fn get_uri<C>(client: &C, uri: &str) -> Result<serde_json::Value>
where
    C: ApiClient + ?Sized,
{
    let method = "GET";
    let (_status, body) = client
        .raw_request(uri, method, None)
        .context(error::RequestSnafu { uri, method })?;
    serde_json::from_str(&body).context(error::ResponseJsonSnafu { body })
}

mod error {
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub enum Error {
        #[snafu(display("Failed {} request to '{}': {}", method, uri, source))]
        Request {
            method: String,
            uri: String,
            #[snafu(source(from(crate::Error, Box::new)))]
            source: Box<crate::Error>,
        },

        #[snafu(display("Response contained invalid JSON '{}' - {}", body, source))]
        ResponseJson {
            body: String,
            source: serde_json::Error,
        },
    }
}
pub use error::Error;
pub type Result<T> = std::result::Result<T, error::Error>;
