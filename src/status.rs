//! HTTP status code classification and human-readable descriptions.
//!
//! [`HttpStatusCode`] accepts any integer in `100..=599`. Classification is
//! arithmetic over the status class, so codes without a registered name are
//! classified just like registered ones.

use std::fmt;

/// A validated HTTP status code in the range `100..=599`.
///
/// # Examples
///
/// ```
/// use courier::HttpStatusCode;
///
/// let code = HttpStatusCode::from_u16(404).unwrap();
/// assert!(code.is_client_error());
/// assert!(code.is_error());
/// assert_eq!(code.reason(), "Not Found");
/// assert_eq!(format!("{:?}", code), "404 Not Found");
///
/// assert!(HttpStatusCode::from_u16(99).is_none());
/// assert!(HttpStatusCode::from_u16(600).is_none());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HttpStatusCode(u16);

/// Returned when converting an out-of-range integer into an [`HttpStatusCode`].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("invalid HTTP status code: {0}")]
pub struct InvalidStatusCode(pub u16);

macro_rules! status_codes {
    ($( $(#[$doc:meta])* ($num:literal, $konst:ident, $phrase:literal); )+) => {
        impl HttpStatusCode {
            $(
                $(#[$doc])*
                pub const $konst: HttpStatusCode = HttpStatusCode($num);
            )+
        }

        fn registered_reason(code: u16) -> Option<&'static str> {
            match code {
                $( $num => Some($phrase), )+
                _ => None,
            }
        }
    };
}

status_codes! {
    // Informational - 1xx
    (100, CONTINUE, "Continue");
    (101, SWITCHING_PROTOCOLS, "Switching Protocols");

    // Successful - 2xx
    (200, OK, "OK");
    (201, CREATED, "Created");
    (202, ACCEPTED, "Accepted");
    (203, NON_AUTHORITATIVE_INFORMATION, "Non Authoritative Information");
    (204, NO_CONTENT, "No Content");
    (205, RESET_CONTENT, "Reset Content");
    (206, PARTIAL_CONTENT, "Partial Content");

    // Redirection - 3xx
    (300, MULTIPLE_CHOICES, "Multiple Choices");
    (301, MOVED_PERMANENTLY, "Moved Permanently");
    (302, FOUND, "Found");
    (303, SEE_OTHER, "See Other");
    (304, NOT_MODIFIED, "Not Modified");
    (305, USE_PROXY, "Use Proxy");
    (307, TEMPORARY_REDIRECT, "Temporary Redirect");

    // Client errors - 4xx
    (400, BAD_REQUEST, "Bad Request");
    (401, UNAUTHORIZED, "Unauthorized");
    (402, PAYMENT_REQUIRED, "Payment Required");
    (403, FORBIDDEN, "Forbidden");
    (404, NOT_FOUND, "Not Found");
    (405, METHOD_NOT_ALLOWED, "Method Not Allowed");
    (406, NOT_ACCEPTABLE, "Not Acceptable");
    (407, PROXY_AUTHENTICATION_REQUIRED, "Proxy Authentication Required");
    (408, REQUEST_TIMEOUT, "Request Timeout");
    (409, CONFLICT, "Conflict");
    (410, GONE, "Gone");
    (411, LENGTH_REQUIRED, "Length Required");
    (412, PRECONDITION_FAILED, "Precondition Failed");
    (413, REQUEST_ENTITY_TOO_LARGE, "Request Entity Too Large");
    (414, REQUEST_URI_TOO_LONG, "Request URI Too Long");
    (415, UNSUPPORTED_MEDIA_TYPE, "Unsupported Media Type");
    (416, REQUESTED_RANGE_NOT_SATISFIABLE, "Requested Range Not Satisfiable");
    (417, EXPECTATION_FAILED, "Expectation Failed");
    (429, TOO_MANY_REQUESTS, "Too Many Requests");

    // Server errors - 5xx
    (500, INTERNAL_SERVER_ERROR, "Internal Server Error");
    (501, NOT_IMPLEMENTED, "Not Implemented");
    (502, BAD_GATEWAY, "Bad Gateway");
    (503, SERVICE_UNAVAILABLE, "Service Unavailable");
    (504, GATEWAY_TIMEOUT, "Gateway Timeout");
    (505, HTTP_VERSION_NOT_SUPPORTED, "HTTP Version Not Supported");
}

const APPLICATION_ERROR_SUGGESTION: &str =
    "This is an application error, try signing out and back in again. If this doesn't resolve the issue, please contact support.";
const CONTACT_SUPPORT_IF_INCORRECT: &str =
    "If you think this is incorrect, please contact support.";
const RETRY_SHORTLY: &str =
    "You can try again shortly, but if the issue persists please contact support.";
const RETRY_SAME_ACTION: &str =
    "You can try the same action again, but if the issue persists please contact support.";

impl HttpStatusCode {
    /// Creates a status code, returning `None` when `code` is outside `100..=599`.
    pub const fn from_u16(code: u16) -> Option<Self> {
        if code >= 100 && code < 600 {
            Some(HttpStatusCode(code))
        } else {
            None
        }
    }

    /// Returns the numeric value.
    pub const fn as_u16(&self) -> u16 {
        self.0
    }

    /// Returns `true` for `100..200`.
    pub const fn is_informational(&self) -> bool {
        self.0 >= 100 && self.0 < 200
    }

    /// Returns `true` for `200..300`.
    pub const fn is_successful(&self) -> bool {
        self.0 >= 200 && self.0 < 300
    }

    /// Returns `true` for `300..400`.
    pub const fn is_redirection(&self) -> bool {
        self.0 >= 300 && self.0 < 400
    }

    /// Returns `true` for `400..500`.
    pub const fn is_client_error(&self) -> bool {
        self.0 >= 400 && self.0 < 500
    }

    /// Returns `true` for `500` and above.
    pub const fn is_server_error(&self) -> bool {
        self.0 >= 500
    }

    /// Returns `true` for client and server errors.
    pub const fn is_error(&self) -> bool {
        self.is_client_error() || self.is_server_error()
    }

    /// Returns `true` if this code has a registered name.
    pub fn is_registered(&self) -> bool {
        registered_reason(self.0).is_some()
    }

    /// Short human-readable description, e.g. `"Not Found"`.
    ///
    /// Codes without a registered name fall back to a description of their
    /// class, e.g. `"Unknown Client Error"` for 499.
    pub fn reason(&self) -> &'static str {
        registered_reason(self.0).unwrap_or_else(|| self.class_fallback())
    }

    fn class_fallback(&self) -> &'static str {
        if self.is_informational() {
            "Unknown Informational"
        } else if self.is_successful() {
            "Unknown Success"
        } else if self.is_redirection() {
            "Unknown Redirection"
        } else if self.is_client_error() {
            "Unknown Client Error"
        } else {
            "Unknown Server Error"
        }
    }

    /// A user-facing sentence describing what went wrong.
    ///
    /// Empty for non-error codes and for error codes without a message.
    pub fn failure_reason(&self) -> &'static str {
        if !self.is_error() {
            return "";
        }

        match self.0 {
            400 => "A bad request was made to the server.",
            401 => "An unauthorized request was made to the server.",
            402 => "Payment is required to access this resource.",
            403 => "Access to that resource is forbidden.",
            404 => "That resource wasn't found.",
            405 => "That kind of request isn't allowed.",
            406 => "That request isn't acceptable.",
            407 => "Proxy authentication is required.",
            408 => "The request timed out.",
            409 => "There was a conflict with that resource.",
            410 => "That resource is gone.",
            411 => "The length of the resource is required.",
            412 => "A precondition failed.",
            413 => "The request entity was too large.",
            414 => "The request URI was too long.",
            415 => "The server doesn't support the type of media in that request.",
            416 => "The requested range isn't able to be satisfied by the server.",
            417 => "An expectation failed.",
            429 => "The user has sent too many requests in a given amount of time.",
            500 => "An error occurred in the server.",
            501 => "That feature of the server isn't implemented.",
            502 => "The gateway is bad.",
            503 => "The server is unavailable.",
            504 => "The request timed out.",
            505 => "That HTTP version is unsupported by the server.",
            _ => "",
        }
    }

    /// A user-facing sentence suggesting how to recover.
    ///
    /// Empty for non-error codes and for error codes without a suggestion.
    pub fn recovery_suggestion(&self) -> &'static str {
        if !self.is_error() {
            return "";
        }

        match self.0 {
            400 | 405..=409 | 411..=417 => APPLICATION_ERROR_SUGGESTION,
            401 => {
                "Try signing out and back in again. If the issue persists, please contact support."
            }
            402 => "Please make a payment for this resource and try again.",
            403 => "If the issue persists, please contact support.",
            404 | 410 => CONTACT_SUPPORT_IF_INCORRECT,
            429 => "Rate request limit exceeded, try again soon.",
            500 | 505 => RETRY_SAME_ACTION,
            502 => "Please contact support if the issue persists.",
            503 | 504 => RETRY_SHORTLY,
            _ => "",
        }
    }
}

impl fmt::Display for HttpStatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

impl fmt::Debug for HttpStatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.0, self.reason())
    }
}

impl TryFrom<u16> for HttpStatusCode {
    type Error = InvalidStatusCode;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        HttpStatusCode::from_u16(code).ok_or(InvalidStatusCode(code))
    }
}

impl TryFrom<http::StatusCode> for HttpStatusCode {
    type Error = InvalidStatusCode;

    fn try_from(status: http::StatusCode) -> Result<Self, Self::Error> {
        HttpStatusCode::try_from(status.as_u16())
    }
}

impl From<HttpStatusCode> for u16 {
    fn from(code: HttpStatusCode) -> u16 {
        code.0
    }
}

impl PartialEq<u16> for HttpStatusCode {
    fn eq(&self, other: &u16) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn predicates(code: HttpStatusCode) -> [bool; 5] {
        [
            code.is_informational(),
            code.is_successful(),
            code.is_redirection(),
            code.is_client_error(),
            code.is_server_error(),
        ]
    }

    #[test]
    fn test_each_band_matches_exactly_one_predicate() {
        let bands = [(100..200, 0), (200..300, 1), (300..400, 2), (400..500, 3), (500..600, 4)];

        for (range, expected) in bands {
            for n in range {
                let code = HttpStatusCode::from_u16(n).unwrap();
                let flags = predicates(code);
                for (i, flag) in flags.iter().enumerate() {
                    assert_eq!(*flag, i == expected, "code {} predicate {}", n, i);
                }
            }
        }
    }

    #[test]
    fn test_out_of_range_codes_are_rejected() {
        for n in (0..100).chain(600..1000).chain([u16::MAX]) {
            assert!(HttpStatusCode::from_u16(n).is_none(), "code {}", n);
        }
        assert_eq!(HttpStatusCode::try_from(42u16), Err(InvalidStatusCode(42)));
    }

    #[test]
    fn test_is_error_is_client_or_server_error() {
        for n in 100..600 {
            let code = HttpStatusCode::from_u16(n).unwrap();
            assert_eq!(
                code.is_error(),
                code.is_client_error() || code.is_server_error()
            );
        }
    }

    #[test]
    fn test_descriptions() {
        assert_eq!(HttpStatusCode::NOT_FOUND.to_string(), "Not Found");
        assert_eq!(format!("{:?}", HttpStatusCode::NOT_FOUND), "404 Not Found");
        assert_eq!(format!("{:?}", HttpStatusCode::OK), "200 OK");

        let unregistered = HttpStatusCode::from_u16(499).unwrap();
        assert!(!unregistered.is_registered());
        assert_eq!(unregistered.reason(), "Unknown Client Error");
        assert!(unregistered.is_client_error());
    }

    #[test]
    fn test_friendly_messaging() {
        assert_eq!(HttpStatusCode::OK.failure_reason(), "");
        assert_eq!(HttpStatusCode::OK.recovery_suggestion(), "");
        assert_eq!(
            HttpStatusCode::NOT_FOUND.failure_reason(),
            "That resource wasn't found."
        );
        assert_eq!(
            HttpStatusCode::BAD_REQUEST.recovery_suggestion(),
            HttpStatusCode::CONFLICT.recovery_suggestion()
        );
        assert_eq!(HttpStatusCode::NOT_IMPLEMENTED.recovery_suggestion(), "");
    }

    #[test]
    fn test_http_status_conversion() {
        let code = HttpStatusCode::try_from(http::StatusCode::CREATED).unwrap();
        assert_eq!(code, HttpStatusCode::CREATED);
        assert_eq!(code, 201u16);

        let too_large = http::StatusCode::from_u16(799).unwrap();
        assert!(HttpStatusCode::try_from(too_large).is_err());
    }
}
