//! HTTP error mapping
//!
//! Folds every crate error into the gateway taxonomy: validation and
//! routing misses are 4xx with diagnostics, persistence and internal
//! failures are 5xx. Bodies follow the `{error, message}` shape.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum GatewayError {
    Core(fx_core::Error),
    Rules(fx_rules::Error),
    Pricing(fx_pricing::Error),
    Deals(fx_deals::Error),
    Routing(fx_routing::Error),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::Core(e) => write!(f, "{}", e),
            GatewayError::Rules(e) => write!(f, "{}", e),
            GatewayError::Pricing(e) => write!(f, "{}", e),
            GatewayError::Deals(e) => write!(f, "{}", e),
            GatewayError::Routing(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for GatewayError {}

impl From<fx_core::Error> for GatewayError {
    fn from(e: fx_core::Error) -> Self {
        GatewayError::Core(e)
    }
}

impl From<fx_rules::Error> for GatewayError {
    fn from(e: fx_rules::Error) -> Self {
        GatewayError::Rules(e)
    }
}

impl From<fx_pricing::Error> for GatewayError {
    fn from(e: fx_pricing::Error) -> Self {
        match e {
            fx_pricing::Error::Core(core) => GatewayError::Core(core),
            other => GatewayError::Pricing(other),
        }
    }
}

impl From<fx_deals::Error> for GatewayError {
    fn from(e: fx_deals::Error) -> Self {
        GatewayError::Deals(e)
    }
}

impl From<fx_routing::Error> for GatewayError {
    fn from(e: fx_routing::Error) -> Self {
        match e {
            fx_routing::Error::Core(core) => GatewayError::Core(core),
            other => GatewayError::Routing(other),
        }
    }
}

impl ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Core(e) => match e {
                fx_core::Error::Validation(_) => StatusCode::BAD_REQUEST,
                fx_core::Error::RateUnavailable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                fx_core::Error::ReferenceDataConflict(_) => StatusCode::CONFLICT,
                fx_core::Error::NotFound(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            GatewayError::Rules(e) => match e {
                fx_rules::Error::Load(_) => StatusCode::BAD_REQUEST,
                fx_rules::Error::Conflict(_) => StatusCode::CONFLICT,
                fx_rules::Error::NotFound(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            GatewayError::Pricing(e) => match e {
                fx_pricing::Error::Validation(_) => StatusCode::BAD_REQUEST,
                fx_pricing::Error::Core(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            GatewayError::Deals(e) => match e {
                fx_deals::Error::Validation(_) => StatusCode::BAD_REQUEST,
                fx_deals::Error::NotFound(_) => StatusCode::NOT_FOUND,
                fx_deals::Error::StateConflict { .. } => StatusCode::CONFLICT,
                fx_deals::Error::InsufficientBalance { .. } => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            GatewayError::Routing(e) => match e {
                fx_routing::Error::Validation(_) => StatusCode::BAD_REQUEST,
                fx_routing::Error::NoEligibleProvider { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                fx_routing::Error::NoRoute { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                fx_routing::Error::Core(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let mut body = json!({
            "error": self.error_code(),
            "message": self.to_string(),
        });

        // Diagnostics the caller can act on
        match self {
            GatewayError::Routing(fx_routing::Error::NoEligibleProvider { exclusions, .. }) => {
                body["exclusions"] = serde_json::to_value(exclusions).unwrap_or_default();
            }
            GatewayError::Core(fx_core::Error::RateUnavailable { .. }) => {
                body["retry_after_seconds"] = json!(5);
            }
            GatewayError::Deals(fx_deals::Error::StateConflict { current, .. }) => {
                body["current_status"] = serde_json::to_value(current).unwrap_or_default();
            }
            _ => {}
        }

        HttpResponse::build(status).json(body)
    }
}

impl GatewayError {
    fn error_code(&self) -> &'static str {
        match self {
            GatewayError::Core(e) => match e {
                fx_core::Error::Validation(_) => "VALIDATION_ERROR",
                fx_core::Error::RateUnavailable { .. } => "RATE_UNAVAILABLE",
                fx_core::Error::ReferenceDataConflict(_) => "REFERENCE_DATA_CONFLICT",
                fx_core::Error::NotFound(_) => "NOT_FOUND",
                _ => "INTERNAL_ERROR",
            },
            GatewayError::Rules(e) => match e {
                fx_rules::Error::Load(_) => "RULE_REJECTED",
                fx_rules::Error::Conflict(_) => "RULE_CONFLICT",
                fx_rules::Error::NotFound(_) => "RULE_NOT_FOUND",
                _ => "INTERNAL_ERROR",
            },
            GatewayError::Pricing(_) => "VALIDATION_ERROR",
            GatewayError::Deals(e) => match e {
                fx_deals::Error::Validation(_) => "VALIDATION_ERROR",
                fx_deals::Error::NotFound(_) => "DEAL_NOT_FOUND",
                fx_deals::Error::StateConflict { .. } => "DEAL_STATE_CONFLICT",
                fx_deals::Error::InsufficientBalance { .. } => "INSUFFICIENT_DEAL_BALANCE",
                _ => "PERSISTENCE_ERROR",
            },
            GatewayError::Routing(e) => match e {
                fx_routing::Error::Validation(_) => "VALIDATION_ERROR",
                fx_routing::Error::NoEligibleProvider { .. } => "NO_ELIGIBLE_PROVIDER",
                fx_routing::Error::NoRoute { .. } => "NO_ROUTE",
                fx_routing::Error::Core(_) => "INTERNAL_ERROR",
            },
        }
    }
}
