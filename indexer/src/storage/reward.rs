//! # Coinbase Reward Split
//!
//! The coinbase reward of a block is computed upstream by the economics
//! module ([`CoinbaseReward`]). This module only splits it across the
//! block's partial solutions, proportionally to their proof targets:
//!
//! ```text
//! target_i  = commitment_i.to_target()
//! reward_i  = floor(reward * target_i / (2 * Σ target_j))
//! ```
//!
//! Arithmetic is done in `u128`, so neither the target sum nor the product
//! can overflow. When the reward is zero, every solution is recorded with
//! target 0 and reward 0.

use crate::chain::{CodecError, PartialSolution};
use crate::config::REWARD_SPLIT_DIVISOR;

/// Pure coinbase reward function: `(height, previous last_coinbase_timestamp) -> reward`.
pub trait CoinbaseReward: Send + Sync {
    fn coinbase_reward(&self, height: u32, last_coinbase_timestamp: i64) -> u64;
}

impl<F> CoinbaseReward for F
where
    F: Fn(u32, i64) -> u64 + Send + Sync,
{
    fn coinbase_reward(&self, height: u32, last_coinbase_timestamp: i64) -> u64 {
        self(height, last_coinbase_timestamp)
    }
}

/// Constant reward for every coinbase block. Handy for tooling and tests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlatReward(pub u64);

impl CoinbaseReward for FlatReward {
    fn coinbase_reward(&self, _height: u32, _last_coinbase_timestamp: i64) -> u64 {
        self.0
    }
}

/// Reward split failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RewardError {
    #[error("cannot derive target of partial solution {index}: {source}")]
    Target {
        index: usize,
        #[source]
        source: CodecError,
    },

    #[error("partial solution targets sum to zero")]
    ZeroTargetSum,
}

/// Target and reward assigned to one partial solution, in solution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SolutionReward {
    pub target: u64,
    pub reward: u64,
}

/// Split `reward` across `solutions`.
pub fn split_coinbase_reward(
    reward: u64,
    solutions: &[PartialSolution],
) -> Result<Vec<SolutionReward>, RewardError> {
    if reward == 0 {
        return Ok(vec![
            SolutionReward {
                target: 0,
                reward: 0,
            };
            solutions.len()
        ]);
    }

    let targets = solutions
        .iter()
        .enumerate()
        .map(|(index, solution)| {
            solution
                .to_target()
                .map_err(|source| RewardError::Target { index, source })
        })
        .collect::<Result<Vec<u64>, _>>()?;

    if targets.is_empty() {
        return Ok(Vec::new());
    }

    let target_sum: u128 = targets.iter().map(|&t| u128::from(t)).sum();
    if target_sum == 0 {
        return Err(RewardError::ZeroTargetSum);
    }
    let denominator = REWARD_SPLIT_DIVISOR * target_sum;

    Ok(targets
        .into_iter()
        .map(|target| {
            let share = u128::from(reward) * u128::from(target) / denominator;
            SolutionReward {
                target,
                // share <= reward / 2, so it always fits.
                reward: u64::try_from(share).unwrap_or(u64::MAX),
            }
        })
        .collect())
}
