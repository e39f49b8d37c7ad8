use super::steward::StewardError;
use oauth2::basic::BasicErrorResponseType;
use oauth2::reqwest::Error as ReqwestClientError;
use oauth2::{HttpClientError, RequestTokenError, StandardErrorResponse};

type RefreshTokenError = RequestTokenError<
    HttpClientError<ReqwestClientError>,
    StandardErrorResponse<BasicErrorResponseType>,
>;

impl From<RefreshTokenError> for StewardError {
    fn from(e: RefreshTokenError) -> Self {
        match e {
            RequestTokenError::ServerResponse(err) => {
                StewardError::Oauth(format!("token endpoint rejected refresh: {}", err.error()))
            }
            RequestTokenError::Request(HttpClientError::Reqwest(real_err)) => {
                StewardError::Reqwest(*real_err)
            }
            RequestTokenError::Request(other) => {
                StewardError::Oauth(format!("HttpClientError: {other:?}"))
            }
            RequestTokenError::Parse(parse_err, body) => {
                let body_str = String::from_utf8_lossy(&body);
                let body = body_str
                    .char_indices()
                    .nth(100)
                    .map(|(idx, _)| format!("{}...<truncated>", &body_str[..idx]))
                    .unwrap_or_else(|| body_str.into_owned());
                StewardError::Oauth(format!("token endpoint parse error: {parse_err}. Body: {body}"))
            }
            RequestTokenError::Other(s) => StewardError::Oauth(s),
        }
    }
}
