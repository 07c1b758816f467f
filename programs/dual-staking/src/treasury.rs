use anchor_lang::prelude::*;
use anchor_spl::token::{self, Token, TokenAccount, Transfer};

use crate::state::{FundsController, StakingError, FUNDS_CONTROLLER_SEED};

/// Rent-exempt minimum of the funds controller account
pub fn rent_floor() -> Result<u64> {
    Ok(Rent::get()?.minimum_balance(FundsController::LEN))
}

/// The treasury must keep strictly more than `floor` lamports after releasing `amount`.
pub fn ensure_reserve(balance: u64, amount: u64, floor: u64) -> Result<()> {
    let remaining = balance
        .checked_sub(amount)
        .ok_or(StakingError::InsufficientFunds)?;
    require!(remaining > floor, StakingError::InsufficientFunds);
    Ok(())
}

/// Move lamports out of the program-owned funds controller, keeping it above its rent floor.
/// Must run after any token CPI of the same instruction.
pub fn release_lamports<'info>(
    funds_controller: &AccountInfo<'info>,
    recipient: &AccountInfo<'info>,
    amount: u64,
    floor: u64,
) -> Result<()> {
    ensure_reserve(funds_controller.lamports(), amount, floor)?;

    {
        let mut from_lamports = funds_controller.try_borrow_mut_lamports()?;
        **from_lamports = (**from_lamports)
            .checked_sub(amount)
            .ok_or(StakingError::InsufficientFunds)?;
    }
    {
        let mut to_lamports = recipient.try_borrow_mut_lamports()?;
        **to_lamports = (**to_lamports)
            .checked_add(amount)
            .ok_or(ProgramError::ArithmeticOverflow)?;
    }

    Ok(())
}

/// Transfer staked tokens from the user's account into the vault
pub fn deposit_tokens<'info>(
    token_program: &Program<'info, Token>,
    user_token_account: &Account<'info, TokenAccount>,
    vault: &Account<'info, TokenAccount>,
    user: &Signer<'info>,
    amount: u64,
) -> Result<()> {
    let cpi_accounts = Transfer {
        from: user_token_account.to_account_info(),
        to: vault.to_account_info(),
        authority: user.to_account_info(),
    };
    let cpi_program = token_program.to_account_info();
    let cpi_ctx = CpiContext::new(cpi_program, cpi_accounts);
    token::transfer(cpi_ctx, amount)
}

/// Transfer staked tokens from the vault back to the user, signed by the funds controller PDA
pub fn withdraw_tokens<'info>(
    token_program: &Program<'info, Token>,
    vault: &Account<'info, TokenAccount>,
    user_token_account: &Account<'info, TokenAccount>,
    funds_controller: &Account<'info, FundsController>,
    amount: u64,
) -> Result<()> {
    let seeds = &[FUNDS_CONTROLLER_SEED, &[funds_controller.bump]];
    let signer = &[&seeds[..]];

    let cpi_accounts = Transfer {
        from: vault.to_account_info(),
        to: user_token_account.to_account_info(),
        authority: funds_controller.to_account_info(),
    };
    let cpi_program = token_program.to_account_info();
    let cpi_ctx = CpiContext::new_with_signer(cpi_program, cpi_accounts, signer);
    token::transfer(cpi_ctx, amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLOOR: u64 = 946_560;

    #[test]
    fn test_reserve_allows_leaving_floor_plus_one() {
        let balance = 10_000_000_000;
        assert!(ensure_reserve(balance, balance - (FLOOR + 1), FLOOR).is_ok());
    }

    #[test]
    fn test_reserve_rejects_leaving_exactly_floor() {
        let balance = 10_000_000_000;
        assert_eq!(
            ensure_reserve(balance, balance - FLOOR, FLOOR).unwrap_err(),
            StakingError::InsufficientFunds.into()
        );
    }

    #[test]
    fn test_reserve_rejects_whole_balance_and_more() {
        let balance = 10_000_000_000;
        assert_eq!(
            ensure_reserve(balance, balance, FLOOR).unwrap_err(),
            StakingError::InsufficientFunds.into()
        );
        assert_eq!(
            ensure_reserve(balance, balance + 1, FLOOR).unwrap_err(),
            StakingError::InsufficientFunds.into()
        );
    }

    #[test]
    fn test_reserve_with_zero_amount_requires_funding_above_floor() {
        assert!(ensure_reserve(FLOOR + 1, 0, FLOOR).is_ok());
        assert!(ensure_reserve(FLOOR, 0, FLOOR).is_err());
    }

    #[test]
    fn test_release_lamports_moves_balance() {
        let program_id = crate::ID;
        let controller_key = Pubkey::new_unique();
        let recipient_key = Pubkey::new_unique();
        let system_id = anchor_lang::system_program::ID;
        let mut controller_lamports = 5_000_000u64;
        let mut recipient_lamports = 1_000u64;
        let mut controller_data = [0u8; FundsController::LEN];
        let mut recipient_data = [0u8; 0];

        let controller = AccountInfo::new(
            &controller_key,
            false,
            true,
            &mut controller_lamports,
            &mut controller_data,
            &program_id,
            false,
            0,
        );
        let recipient = AccountInfo::new(
            &recipient_key,
            true,
            true,
            &mut recipient_lamports,
            &mut recipient_data,
            &system_id,
            false,
            0,
        );

        release_lamports(&controller, &recipient, 2_000_000, FLOOR).unwrap();
        assert_eq!(controller.lamports(), 3_000_000);
        assert_eq!(recipient.lamports(), 2_001_000);

        assert_eq!(
            release_lamports(&controller, &recipient, 3_000_000 - FLOOR, FLOOR).unwrap_err(),
            StakingError::InsufficientFunds.into()
        );
        assert_eq!(controller.lamports(), 3_000_000);
    }
}
