//! Conversion template catalogue
//!
//! Every rail pair has a fixed set of route templates. Templates are data:
//! the multi-rail router materialises them against the current registries,
//! and any change here is a semantic change to the routing contract.
//! Fees are in bps; settlement figures are defaults that materialisation
//! refines from the registries where it knows better (CBDC settlement,
//! ramp settlement).

use fx_core::RailType;

/// How a template converts value between rails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    /// Single fiat provider leg (SWIFT / local clearing / fintech)
    FiatProvider(fx_core::ProviderType),
    /// Two fiat legs through USD
    FiatTriangulated,
    /// Mint CBDC from its own linked fiat
    DirectMint,
    /// FX into the linked fiat, then mint
    FxThenMint,
    /// Fiat onto an mBridge participant corridor
    MbridgeRoute,
    /// Redeem CBDC into its linked fiat
    DirectRedeem,
    /// Redeem, then FX out of the linked fiat
    RedeemThenFx,
    /// Payment-vs-payment across the mBridge corridor
    MbridgePvp,
    /// Fast-payment interlink between Nexus jurisdictions
    ProjectNexus,
    /// Redeem to fiat, FX, re-enter the target rail
    FiatBridge,
    /// Issuer mint (Circle-class on-ramp)
    IssuerOnRamp,
    /// Exchange on-ramp
    CexOnRamp,
    /// FX into the peg currency, then on-ramp
    FxOnRamp,
    /// Issuer redemption (Circle-class off-ramp)
    IssuerOffRamp,
    /// Exchange off-ramp
    CexOffRamp,
    /// Off-ramp, then FX out of the peg currency
    OffRampFx,
    /// Stableswap pool
    CurvePool,
    /// General-purpose AMM
    UniswapPool,
    /// Exchange crossing between stablecoins
    CexCross,
    /// Exchange bridging between a CBDC and a stablecoin
    CexBridge,
    /// mBridge corridor leg plus lowest-fee ramp leg
    MbridgeHybrid,
    /// DEX pool holding tokenised CBDC liquidity
    DexLiquidity,
    /// HTLC atomic swap
    AtomicSwap,
    /// OTC desk crossing
    OtcDesk,
    /// On-chain liquidity pool
    LiquidityPool,
}

/// One row of the conversion catalogue
#[derive(Debug, Clone, Copy)]
pub struct RouteTemplate {
    pub name: &'static str,
    pub source_rail: RailType,
    pub target_rail: RailType,
    /// Rail the finished route is reported under
    pub rail: RailType,
    pub kind: TemplateKind,
    pub fee_bps: i64,
    pub settlement_seconds: u64,
    /// Runs entirely over regulated venues
    pub regulated: bool,
}

use fx_core::ProviderType;
use RailType::{Cbdc as C, Fiat as F, Stablecoin as S};
use TemplateKind::*;

/// The full conversion catalogue across the 9 rail pairs
pub const CATALOGUE: &[RouteTemplate] = &[
    // Fiat -> Fiat
    RouteTemplate { name: "SWIFT", source_rail: F, target_rail: F, rail: F, kind: FiatProvider(ProviderType::Correspondent), fee_bps: 25, settlement_seconds: 172_800, regulated: true },
    RouteTemplate { name: "LOCAL", source_rail: F, target_rail: F, rail: F, kind: FiatProvider(ProviderType::Local), fee_bps: 15, settlement_seconds: 14_400, regulated: true },
    RouteTemplate { name: "FINTECH", source_rail: F, target_rail: F, rail: F, kind: FiatProvider(ProviderType::Fintech), fee_bps: 6, settlement_seconds: 7_200, regulated: true },
    RouteTemplate { name: "TRIANGULATED", source_rail: F, target_rail: F, rail: F, kind: FiatTriangulated, fee_bps: 30, settlement_seconds: 259_200, regulated: true },
    // Fiat -> CBDC
    RouteTemplate { name: "DIRECT_MINT", source_rail: F, target_rail: C, rail: C, kind: DirectMint, fee_bps: 0, settlement_seconds: 1_800, regulated: true },
    RouteTemplate { name: "FX_THEN_MINT", source_rail: F, target_rail: C, rail: C, kind: FxThenMint, fee_bps: 20, settlement_seconds: 7_200, regulated: true },
    RouteTemplate { name: "MBRIDGE_ROUTE", source_rail: F, target_rail: C, rail: C, kind: MbridgeRoute, fee_bps: 13, settlement_seconds: 120, regulated: true },
    // CBDC -> Fiat
    RouteTemplate { name: "DIRECT_REDEEM", source_rail: C, target_rail: F, rail: C, kind: DirectRedeem, fee_bps: 0, settlement_seconds: 1_800, regulated: true },
    RouteTemplate { name: "REDEEM_THEN_FX", source_rail: C, target_rail: F, rail: C, kind: RedeemThenFx, fee_bps: 20, settlement_seconds: 7_200, regulated: true },
    // CBDC -> CBDC
    RouteTemplate { name: "MBRIDGE_PVP", source_rail: C, target_rail: C, rail: C, kind: MbridgePvp, fee_bps: 13, settlement_seconds: 20, regulated: true },
    RouteTemplate { name: "PROJECT_NEXUS", source_rail: C, target_rail: C, rail: C, kind: ProjectNexus, fee_bps: 35, settlement_seconds: 60, regulated: true },
    RouteTemplate { name: "FIAT_BRIDGE", source_rail: C, target_rail: C, rail: F, kind: FiatBridge, fee_bps: 40, settlement_seconds: 86_400, regulated: true },
    // Fiat -> Stablecoin
    RouteTemplate { name: "CIRCLE_ONRAMP", source_rail: F, target_rail: S, rail: S, kind: IssuerOnRamp, fee_bps: 0, settlement_seconds: 1_800, regulated: true },
    RouteTemplate { name: "CEX_ONRAMP", source_rail: F, target_rail: S, rail: S, kind: CexOnRamp, fee_bps: 25, settlement_seconds: 3_600, regulated: true },
    RouteTemplate { name: "FX_ONRAMP", source_rail: F, target_rail: S, rail: S, kind: FxOnRamp, fee_bps: 50, settlement_seconds: 7_200, regulated: true },
    // Stablecoin -> Fiat
    RouteTemplate { name: "CIRCLE_OFFRAMP", source_rail: S, target_rail: F, rail: S, kind: IssuerOffRamp, fee_bps: 0, settlement_seconds: 1_800, regulated: true },
    RouteTemplate { name: "CEX_OFFRAMP", source_rail: S, target_rail: F, rail: S, kind: CexOffRamp, fee_bps: 25, settlement_seconds: 3_600, regulated: true },
    RouteTemplate { name: "OFFRAMP_FX", source_rail: S, target_rail: F, rail: S, kind: OffRampFx, fee_bps: 50, settlement_seconds: 7_200, regulated: true },
    // Stablecoin -> Stablecoin
    RouteTemplate { name: "CURVE", source_rail: S, target_rail: S, rail: S, kind: CurvePool, fee_bps: 4, settlement_seconds: 30, regulated: false },
    RouteTemplate { name: "UNISWAP", source_rail: S, target_rail: S, rail: S, kind: UniswapPool, fee_bps: 30, settlement_seconds: 60, regulated: false },
    RouteTemplate { name: "CEX", source_rail: S, target_rail: S, rail: S, kind: CexCross, fee_bps: 20, settlement_seconds: 600, regulated: true },
    // CBDC -> Stablecoin
    RouteTemplate { name: "FIAT_BRIDGE", source_rail: C, target_rail: S, rail: S, kind: FiatBridge, fee_bps: 25, settlement_seconds: 14_400, regulated: true },
    RouteTemplate { name: "CEX_BRIDGE", source_rail: C, target_rail: S, rail: S, kind: CexBridge, fee_bps: 50, settlement_seconds: 7_200, regulated: true },
    RouteTemplate { name: "MBRIDGE_HYBRID", source_rail: C, target_rail: S, rail: C, kind: MbridgeHybrid, fee_bps: 38, settlement_seconds: 1_830, regulated: true },
    RouteTemplate { name: "DEX_LIQUIDITY", source_rail: C, target_rail: S, rail: S, kind: DexLiquidity, fee_bps: 35, settlement_seconds: 120, regulated: false },
    RouteTemplate { name: "ATOMIC_SWAP", source_rail: C, target_rail: S, rail: S, kind: AtomicSwap, fee_bps: 5, settlement_seconds: 300, regulated: false },
    // Stablecoin -> CBDC
    RouteTemplate { name: "FIAT_BRIDGE", source_rail: S, target_rail: C, rail: C, kind: FiatBridge, fee_bps: 25, settlement_seconds: 14_400, regulated: true },
    RouteTemplate { name: "CEX_BRIDGE", source_rail: S, target_rail: C, rail: C, kind: CexBridge, fee_bps: 50, settlement_seconds: 7_200, regulated: true },
    RouteTemplate { name: "OTC", source_rail: S, target_rail: C, rail: C, kind: OtcDesk, fee_bps: 15, settlement_seconds: 3_600, regulated: true },
    RouteTemplate { name: "LIQUIDITY_POOL", source_rail: S, target_rail: C, rail: C, kind: LiquidityPool, fee_bps: 40, settlement_seconds: 300, regulated: false },
    RouteTemplate { name: "ATOMIC_SWAP", source_rail: S, target_rail: C, rail: C, kind: AtomicSwap, fee_bps: 5, settlement_seconds: 300, regulated: false },
];

/// Templates applicable to a rail pair
pub fn templates_for(source: RailType, target: RailType) -> impl Iterator<Item = &'static RouteTemplate> {
    CATALOGUE
        .iter()
        .filter(move |t| t.source_rail == source && t.target_rail == target)
}
