use crate::{Response, Result};

/// Response hook raising 4XX and 5XX responses as [`Error::Http`](crate::Error::Http).
///
/// The body is logged before the error is returned: as JSON when it parses, as raw
/// text otherwise. Logging never turns the error into a success.
///
/// ```no_run
/// # async fn run() -> rerequests::Result<()> {
/// use rerequests::{hooks::raise_for_status, RequestOptions};
///
/// rerequests::delete("https://example.com/items/1", RequestOptions::new().hook(raise_for_status))
///     .await?;
/// # Ok(())
/// # }
/// ```
pub fn raise_for_status(response: Response) -> Result<Response> {
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return Ok(response);
    }

    match response.json::<serde_json::Value>() {
        Ok(body) => tracing::error!(
            status = status.as_u16(),
            url = response.url(),
            %body,
            "request failed"
        ),
        Err(_) => tracing::error!(
            status = status.as_u16(),
            url = response.url(),
            body = %response.text(),
            "request failed"
        ),
    }
    response.raise_for_status()
}
