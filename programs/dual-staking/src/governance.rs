use anchor_lang::prelude::*;
use anchor_spl::token::Mint;

use crate::ledger;
use crate::state::*;
use crate::treasury;
use crate::DEPLOYER;

/// Create the pool and its funds controller. Only the deployer key may call this.
pub fn initialize(ctx: Context<Initialize>, governance: Pubkey, weightage: u64) -> Result<()> {
    require!(weightage <= MAX_WEIGHTAGE, StakingError::InvalidWeightage);

    let clock = Clock::get()?;

    let global_pool = &mut ctx.accounts.global_pool;
    global_pool.governance = governance;
    global_pool.primary_mint = ctx.accounts.primary_mint.key();
    global_pool.secondary_mint = ctx.accounts.secondary_mint.key();
    global_pool.weightage = weightage;
    global_pool.bump = ctx.bumps.global_pool;

    ctx.accounts.funds_controller.bump = ctx.bumps.funds_controller;

    msg!(
        "Pool initialized: primary {}, secondary {}, weightage {}",
        global_pool.primary_mint,
        global_pool.secondary_mint,
        weightage
    );

    emit!(PoolInitialized {
        governance,
        primary_mint: global_pool.primary_mint,
        secondary_mint: global_pool.secondary_mint,
        weightage,
        timestamp: clock.unix_timestamp,
    });

    Ok(())
}

/// Fund a new distribution window. Unemitted reward of a running window is carried into it.
pub fn update_rewards(ctx: Context<GovernPool>, reward: u64, distribution_seconds: u64) -> Result<()> {
    let clock = Clock::get()?;
    let now = unix_now(&clock)?;

    let update = ledger::update_rewards(&mut ctx.accounts.global_pool, reward, distribution_seconds, now)?;

    msg!(
        "Rewards updated: {} lamports ({} carried over) until {}",
        update.reward_budget,
        update.carried_over,
        update.period_end_time
    );

    emit!(RewardsUpdated {
        reward,
        carried_over: update.carried_over,
        reward_budget: update.reward_budget,
        distribution_seconds,
        period_end_time: update.period_end_time,
        timestamp: clock.unix_timestamp,
    });

    Ok(())
}

/// Restart the current window at the present time, keeping budget and rate
pub fn update_period_end(ctx: Context<GovernPool>, distribution_seconds: u64) -> Result<()> {
    let clock = Clock::get()?;
    let now = unix_now(&clock)?;

    let period_end_time = ledger::update_period_end(&mut ctx.accounts.global_pool, distribution_seconds, now)?;

    msg!("Period end moved to {}", period_end_time);

    emit!(PeriodEndUpdated {
        period_end_time,
        timestamp: clock.unix_timestamp,
    });

    Ok(())
}

pub fn update_weightage(ctx: Context<GovernPool>, weightage: u64) -> Result<()> {
    let clock = Clock::get()?;
    let now = unix_now(&clock)?;

    let old_weightage = ctx.accounts.global_pool.weightage;
    ledger::update_weightage(&mut ctx.accounts.global_pool, weightage, now)?;

    msg!("Weightage updated: {} -> {}", old_weightage, weightage);

    emit!(WeightageUpdated {
        old_weightage,
        new_weightage: weightage,
        timestamp: clock.unix_timestamp,
    });

    Ok(())
}

pub fn update_governance(ctx: Context<GovernPool>, new_governance: Pubkey) -> Result<()> {
    let clock = Clock::get()?;

    let global_pool = &mut ctx.accounts.global_pool;
    let old_governance = global_pool.governance;
    global_pool.governance = new_governance;

    msg!("Governance transferred to {}", new_governance);

    emit!(GovernanceUpdated {
        old_governance,
        new_governance,
        timestamp: clock.unix_timestamp,
    });

    Ok(())
}

/// Move SOL out of the reward treasury. The funds controller always keeps more than its rent floor.
pub fn migrate_funds(ctx: Context<MigrateFunds>, amount: u64) -> Result<()> {
    require!(amount > 0, StakingError::InvalidAmount);

    let clock = Clock::get()?;
    let floor = treasury::rent_floor()?;

    // Transfer SOL from treasury to destination, keeping the rent floor
    treasury::release_lamports(
        &ctx.accounts.funds_controller.to_account_info(),
        &ctx.accounts.destination.to_account_info(),
        amount,
        floor,
    )?;

    let remaining = ctx.accounts.funds_controller.to_account_info().lamports();
    msg!("Migrated {} lamports, {} left in treasury", amount, remaining);

    emit!(FundsMigrated {
        destination: ctx.accounts.destination.key(),
        amount,
        remaining,
        timestamp: clock.unix_timestamp,
    });

    Ok(())
}

#[derive(Accounts)]
pub struct Initialize<'info> {
    #[account(
        mut,
        address = DEPLOYER @ StakingError::InvalidDeployer,
    )]
    pub deployer: Signer<'info>,

    #[account(
        init,
        payer = deployer,
        space = GlobalPool::LEN,
        seeds = [GLOBAL_POOL_SEED],
        bump,
    )]
    pub global_pool: Box<Account<'info, GlobalPool>>,

    #[account(
        init,
        payer = deployer,
        space = FundsController::LEN,
        seeds = [FUNDS_CONTROLLER_SEED],
        bump,
    )]
    pub funds_controller: Account<'info, FundsController>,

    pub primary_mint: Account<'info, Mint>,

    #[account(
        constraint = secondary_mint.key() != primary_mint.key() @ StakingError::InvalidMint
    )]
    pub secondary_mint: Account<'info, Mint>,

    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
pub struct GovernPool<'info> {
    pub governance: Signer<'info>,

    #[account(
        mut,
        seeds = [GLOBAL_POOL_SEED],
        bump = global_pool.bump,
        has_one = governance @ StakingError::NotGovernance,
    )]
    pub global_pool: Box<Account<'info, GlobalPool>>,
}

#[derive(Accounts)]
pub struct MigrateFunds<'info> {
    pub governance: Signer<'info>,

    #[account(
        seeds = [GLOBAL_POOL_SEED],
        bump = global_pool.bump,
        has_one = governance @ StakingError::NotGovernance,
    )]
    pub global_pool: Box<Account<'info, GlobalPool>>,

    #[account(
        mut,
        seeds = [FUNDS_CONTROLLER_SEED],
        bump = funds_controller.bump,
    )]
    pub funds_controller: Account<'info, FundsController>,

    /// CHECK: any system account may receive the migrated lamports
    #[account(mut)]
    pub destination: UncheckedAccount<'info>,
}

#[event]
pub struct PoolInitialized {
    pub governance: Pubkey,
    pub primary_mint: Pubkey,
    pub secondary_mint: Pubkey,
    pub weightage: u64,
    pub timestamp: i64,
}

#[event]
pub struct RewardsUpdated {
    pub reward: u64,
    pub carried_over: u64,
    pub reward_budget: u64,
    pub distribution_seconds: u64,
    pub period_end_time: u64,
    pub timestamp: i64,
}

#[event]
pub struct PeriodEndUpdated {
    pub period_end_time: u64,
    pub timestamp: i64,
}

#[event]
pub struct WeightageUpdated {
    pub old_weightage: u64,
    pub new_weightage: u64,
    pub timestamp: i64,
}

#[event]
pub struct GovernanceUpdated {
    pub old_governance: Pubkey,
    pub new_governance: Pubkey,
    pub timestamp: i64,
}

#[event]
pub struct FundsMigrated {
    pub destination: Pubkey,
    pub amount: u64,
    pub remaining: u64,
    pub timestamp: i64,
}
