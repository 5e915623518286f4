//! Mapping of Liqi error replies to error categories
//!
//! Replies look like `{"code": -1013, "msg": "Invalid quantity."}`, or
//! `{"success": false, "msg": "..."}` where `msg` may itself hold a JSON
//! encoded reply. Messages are matched exactly first, then by substring,
//! and finally the numeric code is looked up.

use std::fmt;

use serde_json::Value;

use crate::errors::HttpError;
use crate::errors::Result;

/// Category of an exchange-reported failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ExchangeError,
    BadRequest,
    InsufficientFunds,
    InvalidOrder,
    MarginModeAlreadySet,
    AccountSuspended,
    AuthenticationError,
    BadResponse,
    BadSymbol,
    DDoSProtection,
    ExchangeNotAvailable,
    InvalidNonce,
    OnMaintenance,
    OrderImmediatelyFillable,
    OrderNotFillable,
    OrderNotFound,
    PermissionDenied,
    RateLimitExceeded,
    RequestTimeout,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::ExchangeError => "ExchangeError",
            ErrorKind::BadRequest => "BadRequest",
            ErrorKind::InsufficientFunds => "InsufficientFunds",
            ErrorKind::InvalidOrder => "InvalidOrder",
            ErrorKind::MarginModeAlreadySet => "MarginModeAlreadySet",
            ErrorKind::AccountSuspended => "AccountSuspended",
            ErrorKind::AuthenticationError => "AuthenticationError",
            ErrorKind::BadResponse => "BadResponse",
            ErrorKind::BadSymbol => "BadSymbol",
            ErrorKind::DDoSProtection => "DDoSProtection",
            ErrorKind::ExchangeNotAvailable => "ExchangeNotAvailable",
            ErrorKind::InvalidNonce => "InvalidNonce",
            ErrorKind::OnMaintenance => "OnMaintenance",
            ErrorKind::OrderImmediatelyFillable => "OrderImmediatelyFillable",
            ErrorKind::OrderNotFillable => "OrderNotFillable",
            ErrorKind::OrderNotFound => "OrderNotFound",
            ErrorKind::PermissionDenied => "PermissionDenied",
            ErrorKind::RateLimitExceeded => "RateLimitExceeded",
            ErrorKind::RequestTimeout => "RequestTimeout",
        }
    }

    /// Whether the failure says the exchange itself is unhealthy
    pub const fn is_outage(self) -> bool {
        matches!(
            self,
            ErrorKind::BadResponse
                | ErrorKind::DDoSProtection
                | ErrorKind::ExchangeNotAvailable
                | ErrorKind::OnMaintenance
                | ErrorKind::RequestTimeout
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body fragments that reject an order on an error status
const ORDER_REJECTIONS: [(&str, &str); 3] = [
    ("Price * QTY is zero or less", "order cost = amount * price is zero or less"),
    ("LOT_SIZE", "order amount should be evenly divisible by lot size"),
    ("PRICE_FILTER", "order price is invalid or outside the allowed price limits"),
];

const EXACT_MESSAGES: [(&str, ErrorKind); 13] = [
    ("System is under maintenance.", ErrorKind::OnMaintenance),
    ("System abnormality", ErrorKind::ExchangeError),
    ("You are not authorized to execute this request.", ErrorKind::PermissionDenied),
    ("API key does not exist", ErrorKind::AuthenticationError),
    ("Order would trigger immediately.", ErrorKind::OrderImmediatelyFillable),
    ("Stop price would trigger immediately.", ErrorKind::OrderImmediatelyFillable),
    ("Order would immediately match and take.", ErrorKind::OrderImmediatelyFillable),
    ("Account has insufficient balance for requested action.", ErrorKind::InsufficientFunds),
    ("Rest API trading is not enabled.", ErrorKind::ExchangeNotAvailable),
    ("You don't have permission.", ErrorKind::PermissionDenied),
    ("Market is closed.", ErrorKind::ExchangeNotAvailable),
    ("Too many requests. Please try again later.", ErrorKind::DDoSProtection),
    ("This action disabled is on this account.", ErrorKind::AccountSuspended),
];

const BROAD_MESSAGES: [(&str, ErrorKind); 2] =
    [("has no operation privilege", ErrorKind::PermissionDenied), ("MAX_POSITION", ErrorKind::InvalidOrder)];

const MARGIN_MODE_UNCHANGED: &str = "No need to change margin type.";

/// Exact match on a full `msg` value
pub fn kind_for_message(message: &str) -> Option<ErrorKind> {
    EXACT_MESSAGES.iter().find(|(text, _)| *text == message).map(|(_, kind)| *kind)
}

/// Substring match on a `msg` value
pub fn broad_kind_for_message(message: &str) -> Option<ErrorKind> {
    BROAD_MESSAGES.iter().find(|(fragment, _)| message.contains(fragment)).map(|(_, kind)| *kind)
}

/// Category of a numeric error code
pub fn kind_for_code(code: i64) -> Option<ErrorKind> {
    let kind = match code {
        -1000 | -1001 | -1016 => ErrorKind::ExchangeNotAvailable,
        -1002 | -1022 | -1099 | -1109 | -1125 | -2008 | -2014 | -2015 | -3001 | -4004 | -4013 | -4046 | -6019 | -13007 => {
            ErrorKind::AuthenticationError
        }
        -1003 | -1015 | -4005 | -6009 | -12014 => ErrorKind::RateLimitExceeded,
        -1004 | -3044 => ErrorKind::DDoSProtection,
        -1005 | -1011 | -4014 | -4016 | -4017 | -4035 => ErrorKind::PermissionDenied,
        -1006 | -1010 => ErrorKind::BadResponse,
        -1007 => ErrorKind::RequestTimeout,
        -1013 | -1014 | -1112 | -2022 | -2025 | -2026 | -2027 | -6005 | -13006 => ErrorKind::InvalidOrder,
        -1021 => ErrorKind::InvalidNonce,
        -1121 | -3002 | -3027 | -3028 | -4018 | -4019 => ErrorKind::BadSymbol,
        -2011 | -2013 => ErrorKind::OrderNotFound,
        -2020 => ErrorKind::OrderNotFillable,
        -2021 => ErrorKind::OrderImmediatelyFillable,
        -3014 | -3018 | -3019 | -3022 | -3036 => ErrorKind::AccountSuspended,
        -2018 | -2019 | -2023 | -2024 | -2028 | -3005 | -3006 | -3008 | -3020 | -3041 | -4024 | -4025 | -4026 | -5002
        | -5003 | -5005 | -5008 | -5013 | -6012 | -11008 => ErrorKind::InsufficientFunds,
        -2010 | -3000 | -3004 | -3007 | -3010 | -3012 | -3015 | -3017 | -3024 | -3029 | -3037 | -3045 | -3999 | -4015
        | -4023 | -4027 | -4030 | -4031 | -4032 | -4034 | -4037 | -4038 | -4041 | -4042 | -4045 | -5010 | -5012
        | -6004 | -6013 => ErrorKind::ExchangeError,
        -1020 | -1023 | -1106..=-1100 | -1108 | -1110 | -1111 | -1120..=-1113 | -1127 | -1128 | -1130 | -1131 | -1136
        | -2016 | -3003 | -3009 | -3011 | -3013 | -3016 | -3021 | -3023 | -3025 | -3026 | -3038 | -3042 | -3043
        | -4003..=-4001 | -4008..=-4006 | -4012..=-4010 | -4021 | -4022 | -4028 | -4029 | -4033 | -4036 | -4039
        | -4040 | -4043 | -4044 | -4047 | -5001 | -5004 | -5006 | -5007 | -5009 | -5011 | -5021 | -6001 | -6003
        | -6008..=-6006 | -6011 | -6018..=-6014 | -6020 | -7001 | -7002 | -10017 | -13005..=-13000
        | 100001003 => ErrorKind::BadRequest,
        _ => return None,
    };
    Some(kind)
}

/// Fallback category for an error status without a recognised body
pub fn kind_for_status(status: u16) -> Option<ErrorKind> {
    let kind = match status {
        418 => ErrorKind::DDoSProtection,
        429 => ErrorKind::RateLimitExceeded,
        422 => ErrorKind::ExchangeError,
        401 | 407 | 511 => ErrorKind::AuthenticationError,
        408 | 504 => ErrorKind::RequestTimeout,
        400 | 403 | 404 | 405 | 409 | 410 | 451 | 500..=503 | 520..=522 | 525 | 526 | 530 => ErrorKind::ExchangeNotAvailable,
        _ => return None,
    };
    Some(kind)
}

fn exchange(kind: ErrorKind, message: impl Into<String>) -> HttpError {
    HttpError::Exchange { kind, message: message.into() }
}

/// Numeric value of a `code` field, given as a JSON number or string
fn parse_code(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| number.as_f64().map(|code| code as i64)),
        Value::String(text) => text.trim().parse::<i64>().ok().or_else(|| text.trim().parse::<f64>().ok().map(|code| code as i64)),
        _ => None,
    }
}

/// Check a reply for an exchange-reported failure
///
/// `authenticated_before` is true once any signed request has succeeded on
/// this client; Liqi then reports a temporary ban as `-2015`.
pub fn check_response(status: u16, body: &str, authenticated_before: bool) -> Result<()> {
    if status == 418 || status == 429 {
        return Err(exchange(ErrorKind::DDoSProtection, format!("{status} {body}")));
    }

    if status >= 400 {
        if let Some((_, reason)) = ORDER_REJECTIONS.iter().find(|(fragment, _)| body.contains(fragment)) {
            return Err(exchange(ErrorKind::InvalidOrder, format!("{reason}: {body}")));
        }
    }

    let Ok(mut response) = serde_json::from_str::<Value>(body) else {
        return check_status(status, body);
    };

    let success = response.get("success").and_then(Value::as_bool).unwrap_or(true);
    if !success {
        let nested = response.get("msg").and_then(Value::as_str).and_then(|msg| serde_json::from_str::<Value>(msg).ok());
        if let Some(nested) = nested {
            response = nested;
        }
    }

    let message = response.get("msg").and_then(Value::as_str);
    if let Some(message) = message {
        if let Some(kind) = kind_for_message(message).or_else(|| broad_kind_for_message(message)) {
            return Err(exchange(kind, message));
        }
    }

    if let Some(code_value) = response.get("code").filter(|code| !code.is_null()) {
        let code = parse_code(code_value);
        if matches!(code, Some(0) | Some(200)) {
            return Ok(());
        }
        if code == Some(-2015) && authenticated_before {
            return Err(exchange(ErrorKind::DDoSProtection, format!("temporary banned: {body}")));
        }
        if message == Some(MARGIN_MODE_UNCHANGED) {
            return Err(exchange(ErrorKind::MarginModeAlreadySet, body));
        }
        let kind = code.and_then(kind_for_code).unwrap_or(ErrorKind::ExchangeError);
        return Err(exchange(kind, body));
    }

    if !success {
        return Err(exchange(ErrorKind::ExchangeError, body));
    }

    check_status(status, body)
}

fn check_status(status: u16, body: &str) -> Result<()> {
    if status < 400 {
        return Ok(());
    }
    let kind = kind_for_status(status).unwrap_or(ErrorKind::ExchangeError);
    Err(exchange(kind, format!("{status} {body}")))
}
