use crate::ApiClient;
use snafu::ResultExt;

/// Sends `body` as JSON to the given URI with the given method (PUT, POST, or PATCH).
pub fn send_json<C>(client: &C, uri: &str, method: &str, body: &serde_json::Value) -> Result<()>
where
    C: ApiClient + ?Sized,
{
    let data = serde_json::to_string(body).context(error::SerializeSnafu)?;
    client
        .raw_request(uri, method, Some(data))
        .context(error::RequestSnafu { uri, method })?;
    Ok(())
}

mod error {
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub enum Error {
        #[snafu(display("Unable to serialize request body: {}", source))]
        Serialize { source: serde_json::Error },

        #[snafu(display("Failed {} request to '{}': {}", method, uri, source))]
        Request {
            method: String,
            uri: String,
            #[snafu(source(from(crate::Error, Box::new)))]
            source: Box<crate::Error>,
        },
    }
}
pub use error::Error;
pub type Result<T> = std::result::Result<T, error::Error>;
