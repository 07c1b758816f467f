// Instruction-level transitions over plain pool/position state.
// Each function validates its inputs, works on copies and commits only on success,
// so a failed call leaves both records exactly as they were. Custody transfers and
// clock reads stay with the handlers in `staking` and `governance`.

use anchor_lang::prelude::*;

use crate::math;
use crate::state::{
    GlobalPool, RewardBreakdown, StakeAsset, StakingError, UserPosition, MAX_WEIGHTAGE,
};

/// Reward settled by a stake, unstake or claim
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Harvest {
    pub reward: RewardBreakdown,
    pub forfeited: bool,
}

impl Harvest {
    /// Lamports the treasury owes the user for this settlement
    pub fn payable(&self) -> Result<u64> {
        if self.forfeited {
            return Ok(0);
        }
        self.reward.total()
    }
}

/// Outcome of a reward budget change
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RewardUpdate {
    pub carried_over: u64,
    pub reward_budget: u64,
    pub period_end_time: u64,
}

fn harvest(
    pool: &GlobalPool,
    position: &mut UserPosition,
    is_emergency: bool,
) -> Result<Harvest> {
    let reward = position.settle(pool)?;
    let harvest = Harvest {
        reward,
        forfeited: is_emergency,
    };
    let paid = harvest.payable()?;
    if paid > 0 {
        position.record_claim(paid)?;
    }
    Ok(harvest)
}

/// Deposit `amount` of `asset`. Opens the position on first use.
pub fn stake(
    pool: &mut GlobalPool,
    position: &mut UserPosition,
    owner: Pubkey,
    bump: u8,
    asset: StakeAsset,
    amount: u64,
    now: u64,
) -> Result<Harvest> {
    require!(amount > 0, StakingError::InvalidAmount);
    require!(pool.reward_budget > 0, StakingError::RewardNotSet);
    require!(!pool.has_period_ended(now), StakingError::RewardPeriodExpired);

    let mut next_pool = pool.clone();
    let mut next_position = position.clone();

    next_pool.advance(now)?;
    if !next_position.is_initialized() {
        next_position.open(owner, bump, &next_pool);
    }
    let harvest = harvest(&next_pool, &mut next_position, false)?;

    next_pool.add_stake(asset, amount)?;
    next_position.deposit(asset, amount)?;

    *pool = next_pool;
    *position = next_position;
    Ok(harvest)
}

/// Withdraw `amount` of `asset`. An emergency withdrawal still moves the checkpoints
/// but forfeits the settled reward for good.
pub fn unstake(
    pool: &mut GlobalPool,
    position: &mut UserPosition,
    asset: StakeAsset,
    amount: u64,
    is_emergency: bool,
    now: u64,
) -> Result<Harvest> {
    require!(amount > 0, StakingError::InvalidAmount);
    require!(amount <= position.staked(asset), StakingError::InsufficientStake);

    let mut next_pool = pool.clone();
    let mut next_position = position.clone();

    next_pool.advance(now)?;
    let harvest = harvest(&next_pool, &mut next_position, is_emergency)?;

    next_pool.remove_stake(asset, amount)?;
    next_position.withdraw(asset, amount)?;

    *pool = next_pool;
    *position = next_position;
    Ok(harvest)
}

/// Settle both assets without touching principal
pub fn claim(pool: &mut GlobalPool, position: &mut UserPosition, now: u64) -> Result<Harvest> {
    let mut next_pool = pool.clone();
    let mut next_position = position.clone();

    next_pool.advance(now)?;
    let harvest = harvest(&next_pool, &mut next_position, false)?;

    *pool = next_pool;
    *position = next_position;
    Ok(harvest)
}

/// What `claim` would pay at `now`, computed on a projection of the pool
pub fn pending_rewards(
    pool: &GlobalPool,
    position: &UserPosition,
    now: u64,
) -> Result<RewardBreakdown> {
    if position.is_empty() {
        return Ok(RewardBreakdown::default());
    }

    let projection = pool.projected(now)?;
    position.pending(&projection)
}

/// Start a new funding window of `distribution_seconds` funded by `reward`
/// plus whatever the running window has not emitted yet.
pub fn update_rewards(
    pool: &mut GlobalPool,
    reward: u64,
    distribution_seconds: u64,
    now: u64,
) -> Result<RewardUpdate> {
    require!(distribution_seconds > 0, StakingError::InvalidAmount);

    // A fresh window needs new funding, a running one may just be re-spread
    let period_ended = pool.has_period_ended(now);
    if period_ended {
        require!(reward > 0, StakingError::InvalidAmount);
    }

    // Remainder of the running window at its own rate, zero once it has ended
    let carried_over = math::unemitted_reward(
        pool.reward_budget,
        pool.distribution_seconds,
        pool.period_end_time,
        now,
    )?;
    let reward_budget = reward
        .checked_add(carried_over)
        .ok_or(ProgramError::ArithmeticOverflow)?;
    let period_end_time = now
        .checked_add(distribution_seconds)
        .ok_or(ProgramError::ArithmeticOverflow)?;

    // Close out accrual under the old configuration before switching
    let mut next_pool = pool.clone();
    next_pool.advance(now)?;
    next_pool.reward_budget = reward_budget;
    next_pool.distribution_seconds = distribution_seconds;
    next_pool.period_end_time = period_end_time;
    next_pool.total_distributed_reward = next_pool
        .total_distributed_reward
        .checked_add(reward)
        .ok_or(ProgramError::ArithmeticOverflow)?;

    *pool = next_pool;
    Ok(RewardUpdate {
        carried_over,
        reward_budget,
        period_end_time,
    })
}

/// Restart the window at `now` for the same budget and rate
pub fn update_period_end(pool: &mut GlobalPool, distribution_seconds: u64, now: u64) -> Result<u64> {
    require!(distribution_seconds > 0, StakingError::InvalidAmount);

    let period_end_time = now
        .checked_add(distribution_seconds)
        .ok_or(ProgramError::ArithmeticOverflow)?;

    let mut next_pool = pool.clone();
    next_pool.advance(now)?;
    next_pool.period_end_time = period_end_time;

    *pool = next_pool;
    Ok(period_end_time)
}

/// Finalize accrual under the old weighting, then switch. Past accumulator history is kept.
pub fn update_weightage(pool: &mut GlobalPool, weightage: u64, now: u64) -> Result<()> {
    require!(weightage <= MAX_WEIGHTAGE, StakingError::InvalidWeightage);

    let mut next_pool = pool.clone();
    next_pool.advance(now)?;
    next_pool.weightage = weightage;

    *pool = next_pool;
    Ok(())
}
