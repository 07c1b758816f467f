use anchor_lang::prelude::*;
use anchor_spl::token::{Mint, Token, TokenAccount};

use crate::ledger::{self, Harvest};
use crate::state::*;
use crate::treasury;

/// Stake `amount` of the asset identified by `mint`, paying out any pending reward first
pub fn stake(ctx: Context<Stake>, amount: u64) -> Result<()> {
    let clock = Clock::get()?;
    let now = unix_now(&clock)?;
    let floor = treasury::rent_floor()?;

    // Nothing can be paid out of an unfunded treasury
    treasury::ensure_reserve(ctx.accounts.funds_controller.to_account_info().lamports(), 0, floor)?;

    // Settle the pool and the position, then book the new principal
    let asset = ctx.accounts.global_pool.asset_for_mint(&ctx.accounts.mint.key())?;
    let harvest = ledger::stake(
        &mut ctx.accounts.global_pool,
        &mut ctx.accounts.user_position,
        ctx.accounts.user.key(),
        ctx.bumps.user_position,
        asset,
        amount,
        now,
    )?;

    // Transfer principal from user to vault
    treasury::deposit_tokens(
        &ctx.accounts.token_program,
        &ctx.accounts.user_token_account,
        &ctx.accounts.vault,
        &ctx.accounts.user,
        amount,
    )?;

    // Pay the settled reward in SOL, after the token CPI
    let reward = pay_out(
        &harvest,
        &ctx.accounts.funds_controller.to_account_info(),
        &ctx.accounts.user.to_account_info(),
        floor,
    )?;

    msg!(
        "Staked {} of {}, reward paid: {} lamports",
        amount,
        ctx.accounts.mint.key(),
        reward
    );

    emit!(Staked {
        user: ctx.accounts.user.key(),
        mint: ctx.accounts.mint.key(),
        amount,
        reward,
        total_staked: ctx.accounts.global_pool.total_staked(asset),
        timestamp: clock.unix_timestamp,
    });

    Ok(())
}

/// Withdraw `amount` of principal. With `is_emergency` the pending reward is forfeited
/// instead of paid, so a failing payout can never lock principal.
pub fn unstake(ctx: Context<Unstake>, amount: u64, is_emergency: bool) -> Result<()> {
    let clock = Clock::get()?;
    let now = unix_now(&clock)?;

    // Settle first so the reward is computed on the principal before withdrawal
    let asset = ctx.accounts.global_pool.asset_for_mint(&ctx.accounts.mint.key())?;
    let harvest = ledger::unstake(
        &mut ctx.accounts.global_pool,
        &mut ctx.accounts.user_position,
        asset,
        amount,
        is_emergency,
        now,
    )?;

    // Transfer principal from vault back to user, signed by the funds controller
    treasury::withdraw_tokens(
        &ctx.accounts.token_program,
        &ctx.accounts.vault,
        &ctx.accounts.user_token_account,
        &ctx.accounts.funds_controller,
        amount,
    )?;

    // Forfeited harvests pay nothing, so the treasury floor is never consulted for them
    let floor = treasury::rent_floor()?;
    let reward = pay_out(
        &harvest,
        &ctx.accounts.funds_controller.to_account_info(),
        &ctx.accounts.user.to_account_info(),
        floor,
    )?;

    if is_emergency {
        msg!(
            "Emergency unstake of {}, forfeited reward: {} lamports",
            amount,
            harvest.reward.total()?
        );
    } else {
        msg!("Unstaked {}, reward paid: {} lamports", amount, reward);
    }

    emit!(Unstaked {
        user: ctx.accounts.user.key(),
        mint: ctx.accounts.mint.key(),
        amount,
        is_emergency,
        reward,
        total_staked: ctx.accounts.global_pool.total_staked(asset),
        timestamp: clock.unix_timestamp,
    });

    Ok(())
}

/// Pay out the reward accrued on both assets
pub fn claim(ctx: Context<Claim>) -> Result<()> {
    let clock = Clock::get()?;
    let now = unix_now(&clock)?;

    let harvest = ledger::claim(
        &mut ctx.accounts.global_pool,
        &mut ctx.accounts.user_position,
        now,
    )?;

    let floor = treasury::rent_floor()?;
    let reward = pay_out(
        &harvest,
        &ctx.accounts.funds_controller.to_account_info(),
        &ctx.accounts.user.to_account_info(),
        floor,
    )?;

    msg!("Claimed {} lamports", reward);

    emit!(RewardsClaimed {
        user: ctx.accounts.user.key(),
        primary_reward: harvest.reward.primary_reward,
        secondary_reward: harvest.reward.secondary_reward,
        total_claimed: ctx.accounts.user_position.total_claimed_reward,
        timestamp: clock.unix_timestamp,
    });

    Ok(())
}

/// Close an empty position. Rent goes back to the owner through `close = user`.
pub fn close_position(ctx: Context<ClosePosition>) -> Result<()> {
    let clock = Clock::get()?;

    msg!("Position closed for {}", ctx.accounts.user.key());

    emit!(PositionClosed {
        user: ctx.accounts.user.key(),
        total_claimed: ctx.accounts.user_position.total_claimed_reward,
        timestamp: clock.unix_timestamp,
    });

    Ok(())
}

/// Reward `user` would receive from a claim right now. Read-only, result is returned
/// as instruction return data.
pub fn pending_rewards(ctx: Context<PendingRewards>, user: Pubkey) -> Result<RewardBreakdown> {
    let clock = Clock::get()?;
    let now = unix_now(&clock)?;

    let position = load_position(&ctx.accounts.user_position)?;

    let pending = ledger::pending_rewards(&ctx.accounts.global_pool, &position, now)?;

    msg!(
        "Pending for {}: primary {} / secondary {}",
        user,
        pending.primary_reward,
        pending.secondary_reward
    );

    Ok(pending)
}

/// Read a position that may never have been created or may already be closed.
/// Closed accounts are handed back to the system program with no data.
pub fn load_position(position_info: &AccountInfo) -> Result<UserPosition> {
    if position_info.data_is_empty() || position_info.owner != &crate::ID {
        return err!(StakingError::AccountNotFound);
    }

    let data = position_info.try_borrow_data()?;
    let position = UserPosition::try_deserialize(&mut &data[..])?;
    Ok(position)
}

fn pay_out<'info>(
    harvest: &Harvest,
    funds_controller: &AccountInfo<'info>,
    user: &AccountInfo<'info>,
    floor: u64,
) -> Result<u64> {
    let amount = harvest.payable()?;
    if amount > 0 {
        treasury::release_lamports(funds_controller, user, amount, floor)?;
    }
    Ok(amount)
}

#[derive(Accounts)]
pub struct Stake<'info> {
    #[account(mut)]
    pub user: Signer<'info>,

    #[account(
        mut,
        seeds = [GLOBAL_POOL_SEED],
        bump = global_pool.bump,
    )]
    pub global_pool: Box<Account<'info, GlobalPool>>,

    #[account(
        mut,
        seeds = [FUNDS_CONTROLLER_SEED],
        bump = funds_controller.bump,
    )]
    pub funds_controller: Account<'info, FundsController>,

    #[account(
        init_if_needed,
        payer = user,
        space = UserPosition::LEN,
        seeds = [USER_POSITION_SEED, user.key().as_ref()],
        bump,
    )]
    pub user_position: Box<Account<'info, UserPosition>>,

    #[account(
        constraint = mint.key() == global_pool.primary_mint
            || mint.key() == global_pool.secondary_mint @ StakingError::InvalidMint
    )]
    pub mint: Account<'info, Mint>,

    #[account(
        mut,
        associated_token::mint = mint,
        associated_token::authority = user,
    )]
    pub user_token_account: Box<Account<'info, TokenAccount>>,

    #[account(
        mut,
        associated_token::mint = mint,
        associated_token::authority = funds_controller,
    )]
    pub vault: Box<Account<'info, TokenAccount>>,

    pub token_program: Program<'info, Token>,
    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
pub struct Unstake<'info> {
    #[account(mut)]
    pub user: Signer<'info>,

    #[account(
        mut,
        seeds = [GLOBAL_POOL_SEED],
        bump = global_pool.bump,
    )]
    pub global_pool: Box<Account<'info, GlobalPool>>,

    #[account(
        mut,
        seeds = [FUNDS_CONTROLLER_SEED],
        bump = funds_controller.bump,
    )]
    pub funds_controller: Account<'info, FundsController>,

    #[account(
        mut,
        seeds = [USER_POSITION_SEED, user.key().as_ref()],
        bump = user_position.bump,
    )]
    pub user_position: Box<Account<'info, UserPosition>>,

    #[account(
        constraint = mint.key() == global_pool.primary_mint
            || mint.key() == global_pool.secondary_mint @ StakingError::InvalidMint
    )]
    pub mint: Account<'info, Mint>,

    #[account(
        mut,
        associated_token::mint = mint,
        associated_token::authority = user,
    )]
    pub user_token_account: Box<Account<'info, TokenAccount>>,

    #[account(
        mut,
        associated_token::mint = mint,
        associated_token::authority = funds_controller,
    )]
    pub vault: Box<Account<'info, TokenAccount>>,

    pub token_program: Program<'info, Token>,
}

#[derive(Accounts)]
pub struct Claim<'info> {
    #[account(mut)]
    pub user: Signer<'info>,

    #[account(
        mut,
        seeds = [GLOBAL_POOL_SEED],
        bump = global_pool.bump,
    )]
    pub global_pool: Box<Account<'info, GlobalPool>>,

    #[account(
        mut,
        seeds = [FUNDS_CONTROLLER_SEED],
        bump = funds_controller.bump,
    )]
    pub funds_controller: Account<'info, FundsController>,

    #[account(
        mut,
        seeds = [USER_POSITION_SEED, user.key().as_ref()],
        bump = user_position.bump,
    )]
    pub user_position: Box<Account<'info, UserPosition>>,
}

#[derive(Accounts)]
pub struct ClosePosition<'info> {
    #[account(mut)]
    pub user: Signer<'info>,

    #[account(
        mut,
        close = user,
        seeds = [USER_POSITION_SEED, user.key().as_ref()],
        bump = user_position.bump,
        constraint = user_position.is_empty() @ StakingError::PositionNotEmpty,
    )]
    pub user_position: Box<Account<'info, UserPosition>>,
}

#[derive(Accounts)]
#[instruction(user: Pubkey)]
pub struct PendingRewards<'info> {
    #[account(
        seeds = [GLOBAL_POOL_SEED],
        bump = global_pool.bump,
    )]
    pub global_pool: Box<Account<'info, GlobalPool>>,

    /// CHECK: may be missing or closed, ownership and layout are checked in the handler
    #[account(
        seeds = [USER_POSITION_SEED, user.as_ref()],
        bump,
    )]
    pub user_position: UncheckedAccount<'info>,
}

#[event]
pub struct Staked {
    pub user: Pubkey,
    pub mint: Pubkey,
    pub amount: u64,
    pub reward: u64,
    pub total_staked: u64,
    pub timestamp: i64,
}

#[event]
pub struct Unstaked {
    pub user: Pubkey,
    pub mint: Pubkey,
    pub amount: u64,
    pub is_emergency: bool,
    pub reward: u64,
    pub total_staked: u64,
    pub timestamp: i64,
}

#[event]
pub struct RewardsClaimed {
    pub user: Pubkey,
    pub primary_reward: u64,
    pub secondary_reward: u64,
    pub total_claimed: u64,
    pub timestamp: i64,
}

#[event]
pub struct PositionClosed {
    pub user: Pubkey,
    pub total_claimed: u64,
    pub timestamp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serialized(position: &UserPosition) -> Vec<u8> {
        let mut data = Vec::new();
        position.try_serialize(&mut data).unwrap();
        data
    }

    #[test]
    fn test_load_position_reads_existing_account() {
        let key = Pubkey::new_unique();
        let owner = crate::ID;
        let position = UserPosition {
            owner: Pubkey::new_unique(),
            staked_primary: 42,
            checkpoint_secondary: 7,
            bump: 251,
            ..Default::default()
        };
        let mut data = serialized(&position);
        let mut lamports = 1_000_000u64;
        let info = AccountInfo::new(&key, false, false, &mut lamports, &mut data, &owner, false, 0);

        let loaded = load_position(&info).unwrap();
        assert_eq!(loaded.owner, position.owner);
        assert_eq!(loaded.staked_primary, 42);
        assert_eq!(loaded.checkpoint_secondary, 7);
        assert_eq!(loaded.bump, 251);
    }

    #[test]
    fn test_load_position_missing_account() {
        let key = Pubkey::new_unique();
        let owner = crate::ID;
        let mut data: Vec<u8> = Vec::new();
        let mut lamports = 0u64;
        let info = AccountInfo::new(&key, false, false, &mut lamports, &mut data, &owner, false, 0);

        assert_eq!(
            load_position(&info).unwrap_err(),
            StakingError::AccountNotFound.into()
        );
    }

    #[test]
    fn test_load_position_closed_account() {
        let key = Pubkey::new_unique();
        let system_id = anchor_lang::system_program::ID;

        let mut empty: Vec<u8> = Vec::new();
        let mut lamports = 0u64;
        let closed = AccountInfo::new(&key, false, false, &mut lamports, &mut empty, &system_id, false, 0);
        assert_eq!(
            load_position(&closed).unwrap_err(),
            StakingError::AccountNotFound.into()
        );

        // Stale bytes under a foreign owner are not a position either
        let mut stale = serialized(&UserPosition {
            staked_secondary: 5,
            ..Default::default()
        });
        let mut stale_lamports = 1u64;
        let foreign = AccountInfo::new(&key, false, false, &mut stale_lamports, &mut stale, &system_id, false, 0);
        assert_eq!(
            load_position(&foreign).unwrap_err(),
            StakingError::AccountNotFound.into()
        );
    }

    #[test]
    fn test_load_position_rejects_other_account_types() {
        let key = Pubkey::new_unique();
        let owner = crate::ID;
        let mut data = Vec::new();
        FundsController { bump: 255 }.try_serialize(&mut data).unwrap();
        data.resize(UserPosition::LEN, 0);
        let mut lamports = 1_000_000u64;
        let info = AccountInfo::new(&key, false, false, &mut lamports, &mut data, &owner, false, 0);

        assert!(load_position(&info).is_err());
    }
}
