use anchor_lang::prelude::*;

pub mod governance;
pub mod ledger;
pub mod math;
pub mod staking;
pub mod state;
pub mod treasury;


use governance::*;
use staking::*;
use state::*;

declare_id!("5h5whpf62w7PQW59njs8qwwbGzUWLfEmHsKtM6hRn39a");

// Only this key may run `initialize`
pub const DEPLOYER: Pubkey =
    anchor_lang::pubkey!("Ch8k1Hipeo8onF1v4gaVqHwxCpqtNX61wQREie3LtUb7");

#[program]
pub mod dual_staking {
    use super::*;

    /// Create the global pool and funds controller
    pub fn initialize(ctx: Context<Initialize>, governance: Pubkey, weightage: u64) -> Result<()> {
        governance::initialize(ctx, governance, weightage)
    }

    /// Stake the asset identified by the `mint` account
    pub fn stake(ctx: Context<Stake>, amount: u64) -> Result<()> {
        staking::stake(ctx, amount)
    }

    /// Withdraw principal, forfeiting pending reward when `is_emergency` is set
    pub fn unstake(ctx: Context<Unstake>, amount: u64, is_emergency: bool) -> Result<()> {
        staking::unstake(ctx, amount, is_emergency)
    }

    pub fn claim(ctx: Context<Claim>) -> Result<()> {
        staking::claim(ctx)
    }

    pub fn close_position(ctx: Context<ClosePosition>) -> Result<()> {
        staking::close_position(ctx)
    }

    /// Read-only projection of what `claim` would pay `user` now
    pub fn pending_rewards(ctx: Context<PendingRewards>, user: Pubkey) -> Result<RewardBreakdown> {
        staking::pending_rewards(ctx, user)
    }

    /// Fund a new distribution window (governance only)
    pub fn update_rewards(
        ctx: Context<GovernPool>,
        reward: u64,
        distribution_seconds: u64,
    ) -> Result<()> {
        governance::update_rewards(ctx, reward, distribution_seconds)
    }

    pub fn update_period_end(ctx: Context<GovernPool>, distribution_seconds: u64) -> Result<()> {
        governance::update_period_end(ctx, distribution_seconds)
    }

    pub fn update_weightage(ctx: Context<GovernPool>, weightage: u64) -> Result<()> {
        governance::update_weightage(ctx, weightage)
    }

    pub fn update_governance(ctx: Context<GovernPool>, new_governance: Pubkey) -> Result<()> {
        governance::update_governance(ctx, new_governance)
    }

    /// Withdraw SOL from the reward treasury (governance only)
    pub fn migrate_funds(ctx: Context<MigrateFunds>, amount: u64) -> Result<()> {
        governance::migrate_funds(ctx, amount)
    }
}
