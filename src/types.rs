//! Contract interfaces and fee value types.

use alloy::{primitives::U256, sol};

sol! {
    /// On-chain read aggregator. One simulated `aggregate` invocation bundles
    /// many independent read calls and returns all their results together with
    /// the block number they were observed at.
    interface IAggregator {
        /// A single prepared read call.
        struct Call {
            address target;
            bytes callData;
        }

        function aggregate(Call[] calldata calls)
            external
            returns (uint256 blockNumber, bytes[] memory returnData);
    }

    /// Fee-schedule contract hosted on the hub chain. Lookups are keyed by
    /// asset symbol and a chain pair; an empty symbol or a zero chain id acts
    /// as a wildcard.
    interface IFeeSchedule {
        function getCrossChainAgentFee(string calldata symbol, uint256 fromChainID, uint256 toChainID)
            external
            view
            returns (
                uint256 numerator,
                uint256 denominator,
                uint256 fixedFee,
                uint256 minFeeLimit,
                uint256 maxFeeLimit
            );
    }

    /// Cross-bridge contract. Network fee is looked up either per token pair
    /// or per (origin, destination) route on the origin chain's deployment.
    interface IBridge {
        /// An (origin, destination) chain-id pair.
        struct RoutePair {
            uint256 srcChainID;
            uint256 destChainID;
        }

        function getFee(RoutePair calldata pair) external view returns (uint256 contractFee);

        function getTokenPairFee(uint256 tokenPairID) external view returns (uint256 contractFee);
    }
}

/// A service fee decoded from the fee schedule: a numerator/denominator ratio
/// plus fixed and bounded components.
///
/// A zero numerator means "no fee configured at this specificity", not "fee is
/// zero"; resolution falls through to a less specific candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentFee {
    /// Ratio numerator.
    pub numerator: U256,
    /// Ratio denominator.
    pub denominator: U256,
    /// Fixed fee component.
    pub fixed_fee: U256,
    /// Lower bound on the resulting fee.
    pub min_fee_limit: U256,
    /// Upper bound on the resulting fee.
    pub max_fee_limit: U256,
}

impl AgentFee {
    /// Whether this entry is actually configured at its specificity level.
    pub fn is_configured(&self) -> bool {
        !self.numerator.is_zero()
    }
}

impl From<IFeeSchedule::getCrossChainAgentFeeReturn> for AgentFee {
    fn from(ret: IFeeSchedule::getCrossChainAgentFeeReturn) -> Self {
        Self {
            numerator: ret.numerator,
            denominator: ret.denominator,
            fixed_fee: ret.fixedFee,
            min_fee_limit: ret.minFeeLimit,
            max_fee_limit: ret.maxFeeLimit,
        }
    }
}
