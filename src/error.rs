use std::fmt;

/// Custom error type for BALLM operations
/// Implements Clone so results can be fanned back in freely
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error
{   /// HTTP transport error
    HttpError(String)
  , /// Provider returned a non-2xx status
    ApiError
    {   status: u16
      , body: String
    }
  , /// Failed to parse a response body
    ParseError(String)
  , /// No choices in API response
    NoChoicesInResponse
  , /// Request exceeded its timeout
    Timeout
  , /// Invalid configuration
    InvalidConfiguration(String)
  , /// No model registered under a `provider-model` key
    UnknownModel(String)
  , /// Normalizer or comparator name not in the registry
    UnknownMode(String)
  , /// Template placeholders without a matching column
    MissingColumns(Vec<String>)
  , /// File system error
    Io(String)
  , /// Generic error
    Other(String)
}

impl fmt::Display for Error
{   fn fmt(&self, f: &mut fmt::Formatter<'_>)
      -> fmt::Result
    {   match self
        {   Error::HttpError(msg) => {
              write!(f, "HTTP error: {}", msg)
            }
          , Error::ApiError { status, body } => {
              write!(f, "API error ({}): {}", status, body)
            }
          , Error::ParseError(msg) => {
              write!(f, "Parse error: {}", msg)
            }
          , Error::NoChoicesInResponse => {
              write!(f, "API response contained no choices")
            }
          , Error::Timeout => {
              write!(f, "Request timed out")
            }
          , Error::InvalidConfiguration(msg) => {
              write!(f, "Invalid configuration: {}", msg)
            }
          , Error::UnknownModel(key) => {
              write!(f, "Unknown model: {}", key)
            }
          , Error::UnknownMode(name) => {
              write!(f, "Unknown mode: {}", name)
            }
          , Error::MissingColumns(columns) => {
              write!(f,
                "Table is missing columns: {}",
                columns.join(", ")
              )
            }
          , Error::Io(msg) => {
              write!(f, "I/O error: {}", msg)
            }
          , Error::Other(msg) => {
              write!(f, "Error: {}", msg)
            }
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

impl From<reqwest::Error> for Error
{   fn from(e: reqwest::Error) -> Self
    {   if e.is_timeout()
        {   Error::Timeout
        } else if e.is_decode()
        {   Error::ParseError(e.to_string())
        } else
        {   Error::HttpError(e.to_string())
        }
    }
}

impl From<serde_json::Error> for Error
{   fn from(e: serde_json::Error) -> Self
    {   Error::ParseError(e.to_string())
    }
}

impl From<serde_yaml::Error> for Error
{   fn from(e: serde_yaml::Error) -> Self
    {   Error::InvalidConfiguration(e.to_string())
    }
}

impl From<std::io::Error> for Error
{   fn from(e: std::io::Error) -> Self
    {   Error::Io(e.to_string())
    }
}

impl From<String> for Error
{   fn from(s: String) -> Self
    {   Error::Other(s)
    }
}

impl From<&str> for Error
{   fn from(s: &str) -> Self
    {   Error::Other(s.to_string())
    }
}
