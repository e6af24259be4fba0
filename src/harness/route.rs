//! Route resolution: the routing API first, the bridge contract second.
//!
//! The fallback only covers route discovery. Neither path can move a token
//! that does not exist on the source chain yet, so an unresolved source
//! address is rejected before either backend is asked.

use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::approval::{ApprovalManager, ApprovalOutcome};
use crate::blockchain::traits::{Bridge, ChainClient, Router};
use crate::blockchain::types::{BridgeAssetParams, RouteRequest, UnsignedTransfer};
use crate::core::config::{ChainDescriptor, HarnessSettings};
use crate::core::errors::{HarnessError, Result};
use crate::core::token_registry::TokenRegistry;

/// Provider tag reported for transfers built against the bridge contract.
pub const FALLBACK_PROVIDER: &str = "bridge-contract";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RouteMethod {
    Primary,
    Fallback,
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteMethod::Primary => write!(f, "PRIMARY"),
            RouteMethod::Fallback => write!(f, "FALLBACK"),
        }
    }
}

/// One transfer to route.
#[derive(Debug, Clone, Copy)]
pub struct RouteContext<'a> {
    pub from: &'a ChainDescriptor,
    pub to: &'a ChainDescriptor,
    pub token: &'a str,
    pub amount: U256,
    pub wallet: Address,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRoute {
    pub unsigned: UnsignedTransfer,
    pub provider: String,
    /// Whether the destination side needs a separate claim transaction.
    pub requires_claim: bool,
    pub approval: ApprovalOutcome,
    /// Why the primary path was abandoned, for fallback routes.
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    Primary(ResolvedRoute),
    Fallback(ResolvedRoute),
    /// Both paths were attempted and failed.
    Unavailable { reason: String },
}

impl RouteOutcome {
    pub fn method(&self) -> Option<RouteMethod> {
        match self {
            RouteOutcome::Primary(_) => Some(RouteMethod::Primary),
            RouteOutcome::Fallback(_) => Some(RouteMethod::Fallback),
            RouteOutcome::Unavailable { .. } => None,
        }
    }
}

pub struct RouteResolver {
    router: Arc<dyn Router>,
    bridge: Arc<dyn Bridge>,
    approvals: Arc<ApprovalManager>,
    registry: TokenRegistry,
    slippage: f64,
    claim_protocol: String,
    force_update_global_exit_root: bool,
}

impl RouteResolver {
    pub fn new(
        router: Arc<dyn Router>,
        bridge: Arc<dyn Bridge>,
        approvals: Arc<ApprovalManager>,
        registry: TokenRegistry,
        settings: &HarnessSettings,
    ) -> Self {
        Self {
            router,
            bridge,
            approvals,
            registry,
            slippage: settings.slippage,
            claim_protocol: settings.claim_protocol.clone(),
            force_update_global_exit_root: settings.force_update_global_exit_root,
        }
    }

    /// Resolves an unsigned transfer for `ctx`, running approvals on the way.
    ///
    /// `Err` is reserved for failures that no backend switch can fix: an
    /// unresolved source token and failed approvals.
    pub async fn resolve(&self, ctx: RouteContext<'_>, client: &dyn ChainClient) -> Result<RouteOutcome> {
        let not_resolved = |chain: &str| HarnessError::TokenNotResolved {
            symbol: ctx.token.to_string(),
            chain: chain.to_string(),
        };
        let source = self.registry.descriptor(ctx.token, &ctx.from.key).ok_or_else(|| not_resolved(&ctx.from.key))?;
        let destination = self.registry.descriptor(ctx.token, &ctx.to.key).ok_or_else(|| not_resolved(&ctx.to.key))?;
        let source_token = source.source_address().ok_or_else(|| not_resolved(&ctx.from.key))?;

        let destination_token = match destination.source_address() {
            Some(address) => address,
            None => {
                // The router reads the zero address as "native", so this may
                // route to the wrong asset on a first inbound transfer.
                warn!(
                    token = ctx.token,
                    chain = %ctx.to.key,
                    "Destination token unresolved, requesting routes with the zero address"
                );
                Address::zero()
            }
        };

        let primary_error = match self.try_primary(&ctx, client, source_token, destination_token).await {
            Ok(route) => return Ok(RouteOutcome::Primary(route)),
            Err(e @ HarnessError::ApprovalFailed { .. }) => return Err(e),
            Err(e) => e,
        };
        info!(
            token = ctx.token,
            from = %ctx.from.key,
            to = %ctx.to.key,
            reason = %primary_error,
            "Primary route failed, falling back to the bridge contract"
        );

        match self.try_fallback(&ctx, client, source_token).await {
            Ok(mut route) => {
                route.fallback_reason = Some(primary_error.to_string());
                Ok(RouteOutcome::Fallback(route))
            }
            Err(e @ HarnessError::ApprovalFailed { .. }) => Err(e),
            Err(fallback_error) => Ok(RouteOutcome::Unavailable {
                reason: format!("primary: {}; fallback: {}", primary_error, fallback_error),
            }),
        }
    }

    async fn try_primary(
        &self,
        ctx: &RouteContext<'_>,
        client: &dyn ChainClient,
        source_token: Address,
        destination_token: Address,
    ) -> Result<ResolvedRoute> {
        let request = RouteRequest {
            from_chain_id: ctx.from.chain_id,
            to_chain_id: ctx.to.chain_id,
            from_token_address: source_token,
            to_token_address: destination_token,
            amount: ctx.amount,
            from_address: ctx.wallet,
            slippage: self.slippage,
        };
        let routes = self.router.get_routes(&request).await?;
        debug!(count = routes.len(), "Routes returned");
        let route = routes
            .into_iter()
            .find(|r| r.is_executable())
            .ok_or_else(|| HarnessError::NoRouteAvailable("router returned no executable route".to_string()))?;

        let approval = if source_token == Address::zero() {
            ApprovalOutcome::NotRequired
        } else {
            let spender = route.approval_address().or(ctx.from.bridge_address).ok_or_else(|| {
                HarnessError::Config(format!("no approval target for routes from {}", ctx.from.key))
            })?;
            self.approvals.ensure_approval(client, source_token, spender, ctx.amount, ctx.wallet).await?
        };

        let unsigned = match &route.transaction_request {
            Some(tx) => tx.clone(),
            None => self.router.get_unsigned_transaction(&route).await?,
        };
        Ok(ResolvedRoute {
            unsigned,
            requires_claim: route.provider.eq_ignore_ascii_case(&self.claim_protocol),
            provider: route.provider,
            approval,
            fallback_reason: None,
        })
    }

    async fn try_fallback(
        &self,
        ctx: &RouteContext<'_>,
        client: &dyn ChainClient,
        source_token: Address,
    ) -> Result<ResolvedRoute> {
        let bridge_address = ctx
            .from
            .bridge_address
            .ok_or_else(|| HarnessError::Config(format!("no bridge contract configured on {}", ctx.from.key)))?;
        let approval =
            self.approvals.ensure_approval(client, source_token, bridge_address, ctx.amount, ctx.wallet).await?;

        let params = BridgeAssetParams {
            destination_network: ctx.to.network_id,
            destination_address: ctx.wallet,
            amount: ctx.amount,
            token: source_token,
            force_update_global_exit_root: self.force_update_global_exit_root,
        };
        let unsigned = self.bridge.build_bridge_asset(ctx.from.chain_id, bridge_address, &params, ctx.wallet).await?;
        Ok(ResolvedRoute {
            unsigned,
            provider: FALLBACK_PROVIDER.to_string(),
            requires_claim: true,
            approval,
            fallback_reason: None,
        })
    }
}
