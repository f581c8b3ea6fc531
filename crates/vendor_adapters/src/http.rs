use std::time::Duration;

use reqwest::{Client, StatusCode};
use shared::error::AdapterError;

pub(crate) fn build_client(timeout: Duration) -> Result<Client, AdapterError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|err| AdapterError::unreachable(format!("failed to build http client: {err}")))
}

pub(crate) fn transport_error(err: reqwest::Error) -> AdapterError {
    if err.is_decode() {
        AdapterError::invalid_response(format!("undecodable body: {err}"))
    } else if err.is_timeout() {
        AdapterError::unreachable(format!("request timed out: {err}"))
    } else {
        AdapterError::unreachable(err.to_string())
    }
}

pub(crate) fn check_status(status: StatusCode) -> Result<(), AdapterError> {
    match status {
        StatusCode::TOO_MANY_REQUESTS => Err(AdapterError::rate_limited("http 429")),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(AdapterError::unauthorized(format!("http {}", status.as_u16())))
        }
        status if !status.is_success() => Err(AdapterError::invalid_response(format!(
            "unexpected http status {}",
            status.as_u16()
        ))),
        _ => Ok(()),
    }
}
