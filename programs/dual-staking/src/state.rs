use anchor_lang::prelude::*;

use crate::math;

pub const GLOBAL_POOL_SEED: &[u8] = b"global_pool";
pub const FUNDS_CONTROLLER_SEED: &[u8] = b"funds_controller";
pub const USER_POSITION_SEED: &[u8] = b"user_position";

/// Upper bound for the secondary asset weightage (1000x, scaled by 1e9)
pub const MAX_WEIGHTAGE: u64 = 1_000 * math::WEIGHTAGE_SCALE as u64;

/// Cluster time as unsigned seconds
pub fn unix_now(clock: &Clock) -> Result<u64> {
    u64::try_from(clock.unix_timestamp).map_err(|_| ProgramError::InvalidArgument.into())
}

/// Which of the two stakeable assets an instruction acts on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StakeAsset {
    Primary,
    Secondary,
}

/// Singleton pool ledger: funding window, accumulators and aggregate principal
#[account]
#[derive(Default, Debug)]
pub struct GlobalPool {
    pub governance: Pubkey,
    pub primary_mint: Pubkey,
    pub secondary_mint: Pubkey,
    pub weightage: u64, // Secondary -> primary weight, scaled by 1e9 (500_000_000 = 0.5)
    pub reward_budget: u64, // Lamports emitted over the current window
    pub distribution_seconds: u64,
    pub period_end_time: u64,
    pub last_settled_time: u64,
    pub acc_per_share_primary: u128, // Scaled by 1e18
    pub acc_per_share_secondary: u128, // Scaled by 1e18
    pub total_staked_primary: u64,
    pub total_staked_secondary: u64,
    pub total_distributed_reward: u64, // Sum of budgets funded by governance (for analytics)
    pub bump: u8,
}

impl GlobalPool {
    pub const LEN: usize = 8 + // discriminator
        32 + // governance
        32 + // primary_mint
        32 + // secondary_mint
        8 +  // weightage
        8 +  // reward_budget
        8 +  // distribution_seconds
        8 +  // period_end_time
        8 +  // last_settled_time
        16 + // acc_per_share_primary
        16 + // acc_per_share_secondary
        8 +  // total_staked_primary
        8 +  // total_staked_secondary
        8 +  // total_distributed_reward
        1;   // bump

    pub fn asset_for_mint(&self, mint: &Pubkey) -> Result<StakeAsset> {
        if *mint == self.primary_mint {
            Ok(StakeAsset::Primary)
        } else if *mint == self.secondary_mint {
            Ok(StakeAsset::Secondary)
        } else {
            err!(StakingError::InvalidMint)
        }
    }

    pub fn total_staked(&self, asset: StakeAsset) -> u64 {
        match asset {
            StakeAsset::Primary => self.total_staked_primary,
            StakeAsset::Secondary => self.total_staked_secondary,
        }
    }

    pub fn has_period_ended(&self, now: u64) -> bool {
        now >= self.period_end_time
    }

    /// Latest time reward can accrue to: `now`, capped at the end of the funding window.
    pub fn last_reward_time(&self, now: u64) -> u64 {
        now.min(self.period_end_time)
    }

    /// Advance the accumulators up to `min(now, period_end_time)`.
    ///
    /// Emission over an interval where the weighted stake is zero is dropped,
    /// only `last_settled_time` moves.
    pub fn advance(&mut self, now: u64) -> Result<()> {
        let effective_now = self.last_reward_time(now);
        if effective_now <= self.last_settled_time {
            return Ok(());
        }

        let weighted_total = math::weighted_total(
            self.total_staked_primary,
            self.total_staked_secondary,
            self.weightage,
        )?;

        if weighted_total > 0 {
            let (delta_primary, delta_secondary) = math::accrual_delta(
                effective_now - self.last_settled_time,
                self.reward_budget,
                self.distribution_seconds,
                weighted_total,
                self.weightage,
            )?;

            self.acc_per_share_primary = self
                .acc_per_share_primary
                .checked_add(delta_primary)
                .ok_or(ProgramError::ArithmeticOverflow)?;
            self.acc_per_share_secondary = self
                .acc_per_share_secondary
                .checked_add(delta_secondary)
                .ok_or(ProgramError::ArithmeticOverflow)?;
        }

        self.last_settled_time = effective_now;
        Ok(())
    }

    /// Copy of the pool advanced to `now`, leaving `self` untouched
    pub fn projected(&self, now: u64) -> Result<GlobalPool> {
        let mut projection = self.clone();
        projection.advance(now)?;
        Ok(projection)
    }

    pub fn add_stake(&mut self, asset: StakeAsset, amount: u64) -> Result<()> {
        let total = match asset {
            StakeAsset::Primary => &mut self.total_staked_primary,
            StakeAsset::Secondary => &mut self.total_staked_secondary,
        };
        *total = total
            .checked_add(amount)
            .ok_or(ProgramError::ArithmeticOverflow)?;
        Ok(())
    }

    pub fn remove_stake(&mut self, asset: StakeAsset, amount: u64) -> Result<()> {
        let total = match asset {
            StakeAsset::Primary => &mut self.total_staked_primary,
            StakeAsset::Secondary => &mut self.total_staked_secondary,
        };
        *total = total
            .checked_sub(amount)
            .ok_or(StakingError::InsufficientStake)?;
        Ok(())
    }
}

/// Per-depositor ledger, derived from [USER_POSITION_SEED, owner]
#[account]
#[derive(Default, Debug)]
pub struct UserPosition {
    pub owner: Pubkey,
    pub checkpoint_primary: u128, // acc_per_share_primary at last settlement
    pub checkpoint_secondary: u128, // acc_per_share_secondary at last settlement
    pub staked_primary: u64,
    pub staked_secondary: u64,
    pub total_claimed_reward: u64, // Lamports actually paid out (for analytics)
    pub bump: u8,
}

impl UserPosition {
    pub const LEN: usize = 8 + // discriminator
        32 + // owner
        16 + // checkpoint_primary
        16 + // checkpoint_secondary
        8 +  // staked_primary
        8 +  // staked_secondary
        8 +  // total_claimed_reward
        1;   // bump

    pub fn is_initialized(&self) -> bool {
        self.owner != Pubkey::default()
    }

    /// Bind a fresh position to its owner. Checkpoints start at the pool's current
    /// accumulators so no reward predating the position is owed.
    pub fn open(&mut self, owner: Pubkey, bump: u8, pool: &GlobalPool) {
        self.owner = owner;
        self.bump = bump;
        self.checkpoint_primary = pool.acc_per_share_primary;
        self.checkpoint_secondary = pool.acc_per_share_secondary;
    }

    pub fn staked(&self, asset: StakeAsset) -> u64 {
        match asset {
            StakeAsset::Primary => self.staked_primary,
            StakeAsset::Secondary => self.staked_secondary,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.staked_primary == 0 && self.staked_secondary == 0
    }

    /// Reward accrued since the last checkpoint against `pool`'s accumulators
    pub fn pending(&self, pool: &GlobalPool) -> Result<RewardBreakdown> {
        Ok(RewardBreakdown {
            primary_reward: math::settlement_amount(
                pool.acc_per_share_primary,
                self.checkpoint_primary,
                self.staked_primary,
            )?,
            secondary_reward: math::settlement_amount(
                pool.acc_per_share_secondary,
                self.checkpoint_secondary,
                self.staked_secondary,
            )?,
        })
    }

    /// Compute the pending reward and move both checkpoints to the pool's accumulators.
    pub fn settle(&mut self, pool: &GlobalPool) -> Result<RewardBreakdown> {
        let reward = self.pending(pool)?;
        self.checkpoint_primary = pool.acc_per_share_primary;
        self.checkpoint_secondary = pool.acc_per_share_secondary;
        Ok(reward)
    }

    pub fn deposit(&mut self, asset: StakeAsset, amount: u64) -> Result<()> {
        let staked = match asset {
            StakeAsset::Primary => &mut self.staked_primary,
            StakeAsset::Secondary => &mut self.staked_secondary,
        };
        *staked = staked
            .checked_add(amount)
            .ok_or(ProgramError::ArithmeticOverflow)?;
        Ok(())
    }

    pub fn withdraw(&mut self, asset: StakeAsset, amount: u64) -> Result<()> {
        let staked = match asset {
            StakeAsset::Primary => &mut self.staked_primary,
            StakeAsset::Secondary => &mut self.staked_secondary,
        };
        *staked = staked
            .checked_sub(amount)
            .ok_or(StakingError::InsufficientStake)?;
        Ok(())
    }

    pub fn record_claim(&mut self, amount: u64) -> Result<()> {
        self.total_claimed_reward = self
            .total_claimed_reward
            .checked_add(amount)
            .ok_or(ProgramError::ArithmeticOverflow)?;
        Ok(())
    }
}

/// Program-owned authority over the token vaults and the SOL reward pool
#[account]
#[derive(Default, Debug)]
pub struct FundsController {
    pub bump: u8,
}

impl FundsController {
    pub const LEN: usize = 8 + // discriminator
        1;   // bump
}

/// Reward per asset class, also the return data of `pending_rewards`
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RewardBreakdown {
    pub primary_reward: u64,
    pub secondary_reward: u64,
}

impl RewardBreakdown {
    pub fn total(&self) -> Result<u64> {
        Ok(self
            .primary_reward
            .checked_add(self.secondary_reward)
            .ok_or(ProgramError::ArithmeticOverflow)?)
    }
}

#[error_code]
pub enum StakingError {
    #[msg("Caller is not governance")]
    NotGovernance,
    #[msg("Invalid amount - must be greater than zero")]
    InvalidAmount,
    #[msg("Amount greater than staked amount")]
    InsufficientStake,
    #[msg("Insufficient funds in treasury")]
    InsufficientFunds,
    #[msg("Position still holds staked principal")]
    PositionNotEmpty,
    #[msg("Position account not found")]
    AccountNotFound,
    #[msg("Caller is not the deployer")]
    InvalidDeployer,
    #[msg("Mint is not one of the pool assets")]
    InvalidMint,
    #[msg("Reward is not set")]
    RewardNotSet,
    #[msg("Reward distribution period has expired")]
    RewardPeriodExpired,
    #[msg("Weightage out of range")]
    InvalidWeightage,
}
