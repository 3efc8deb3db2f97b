//! Request/response bodies specific to the HTTP surface

use fx_core::Side;
use fx_deals::BestRateResult;
use fx_routing::RoutingResponse;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct SubmitBody {
    pub submitted_by: String,
}

#[derive(Debug, Deserialize)]
pub struct ApproveBody {
    pub approved_by: String,
}

#[derive(Debug, Deserialize)]
pub struct RejectBody {
    pub rejected_by: String,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct CancelBody {
    pub cancelled_by: String,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct UtilizeBody {
    pub amount: Decimal,
    pub by: String,
}

#[derive(Debug, Deserialize)]
pub struct BestRateQuery {
    pub source_currency: String,
    pub target_currency: String,
    pub side: Side,
    pub amount: Decimal,
    #[serde(default)]
    pub customer_tier: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RatesQuery {
    /// Comma-separated pair keys (`USDINR,USDAED`); defaults to every pair
    /// the provider table supports
    #[serde(default)]
    pub pairs: Option<String>,
}

/// Provider ranking plus the deal short-circuit, when one wins
#[derive(Debug, Serialize)]
pub struct RecommendResponse {
    pub recommendation: RoutingResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deal: Option<BestRateResult>,
}
