use anchor_lang::prelude::*;

/// Scale of `GlobalPool::weightage` (1.0 = 1_000_000_000)
pub const WEIGHTAGE_SCALE: u128 = 1_000_000_000;

/// Scale of the reward-per-share accumulators
pub const ACC_SCALE: u128 = 1_000_000_000_000_000_000;

// Kept out of the anchor prelude's scope so the macro sees std `Result`
mod u256 {
    use uint::construct_uint;

    construct_uint! {
        /// 256-bit intermediate for products of two u128 values
        pub struct U256(4);
    }
}
pub use u256::U256;

/// floor(a * b / denominator), with the product held in 256 bits.
/// Fails only when the quotient itself does not fit in a u128.
pub fn mul_div(a: u128, b: u128, denominator: u128) -> Result<u128> {
    if denominator == 0 {
        return Err(ProgramError::ArithmeticOverflow.into());
    }

    // Two u128 factors never overflow 256 bits
    let product = U256::from(a)
        .checked_mul(U256::from(b))
        .ok_or(ProgramError::ArithmeticOverflow)?;
    let quotient = product / U256::from(denominator);
    if quotient > U256::from(u128::MAX) {
        return Err(ProgramError::ArithmeticOverflow.into());
    }

    Ok(quotient.as_u128())
}

/// Stake of the whole pool expressed in primary-asset units:
/// total_primary + total_secondary * weightage
pub fn weighted_total(total_primary: u64, total_secondary: u64, weightage: u64) -> Result<u128> {
    let weighted_secondary = mul_div(
        total_secondary as u128,
        weightage as u128,
        WEIGHTAGE_SCALE,
    )?;

    Ok(weighted_secondary
        .checked_add(total_primary as u128)
        .ok_or(ProgramError::ArithmeticOverflow)?)
}

/// Accumulator increments (primary, secondary) for `elapsed` seconds of emission at
/// `reward_budget / distribution_seconds` lamports per second, shared by `weighted_total`.
///
/// The primary increment is floor(elapsed * reward_budget * ACC_SCALE / distribution_seconds / weighted_total),
/// the secondary one is the primary increment scaled by the weightage.
/// An empty pool yields zero increments: that emission is forfeited.
pub fn accrual_delta(
    elapsed: u64,
    reward_budget: u64,
    distribution_seconds: u64,
    weighted_total: u128,
    weightage: u64,
) -> Result<(u128, u128)> {
    if elapsed == 0 || distribution_seconds == 0 || weighted_total == 0 {
        return Ok((0, 0));
    }

    let emitted = (elapsed as u128)
        .checked_mul(reward_budget as u128)
        .ok_or(ProgramError::ArithmeticOverflow)?;
    let denominator = (distribution_seconds as u128)
        .checked_mul(weighted_total)
        .ok_or(ProgramError::ArithmeticOverflow)?;

    let delta_primary = mul_div(emitted, ACC_SCALE, denominator)?;
    let delta_secondary = mul_div(delta_primary, weightage as u128, WEIGHTAGE_SCALE)?;

    Ok((delta_primary, delta_secondary))
}

/// Reward earned by `staked` units since the accumulator stood at `checkpoint`.
pub fn settlement_amount(acc_per_share: u128, checkpoint: u128, staked: u64) -> Result<u64> {
    let earned_per_share = acc_per_share
        .checked_sub(checkpoint)
        .ok_or(ProgramError::ArithmeticOverflow)?;
    let amount = mul_div(earned_per_share, staked as u128, ACC_SCALE)?;

    u64::try_from(amount).map_err(|_| ProgramError::ArithmeticOverflow.into())
}

/// Part of `reward_budget` not yet emitted at `now`, at the window's own rate.
/// Zero once the window has ended.
pub fn unemitted_reward(
    reward_budget: u64,
    distribution_seconds: u64,
    period_end_time: u64,
    now: u64,
) -> Result<u64> {
    if now >= period_end_time || distribution_seconds == 0 {
        return Ok(0);
    }

    let remaining_seconds = period_end_time - now;
    let remaining = mul_div(
        remaining_seconds as u128,
        reward_budget as u128,
        distribution_seconds as u128,
    )?;

    u64::try_from(remaining).map_err(|_| ProgramError::ArithmeticOverflow.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOL: u64 = 1_000_000_000;
    const THIRTY_DAYS: u64 = 30 * 24 * 60 * 60;
    const HALF: u64 = 500_000_000;

    #[test]
    fn test_mul_div_matches_direct_product() {
        assert_eq!(mul_div(10, 20, 3).unwrap(), 66);
        assert_eq!(mul_div(0, u128::MAX, 7).unwrap(), 0);
    }

    #[test]
    fn test_mul_div_handles_products_beyond_u128() {
        // (2^127 * 4) / 8 = 2^126
        let a = 1u128 << 127;
        assert_eq!(mul_div(a, 4, 8).unwrap(), 1u128 << 126);

        // 1e21 * 1e18 overflows u128 while the quotient is ~3.86e17
        let emitted = 1_000_000_000_000_000_000_000u128;
        let denominator = 2_592_000_000_000_000_000_000u128;
        assert_eq!(mul_div(emitted, ACC_SCALE, denominator).unwrap(), 385_802_469_135_802_469);

        assert_eq!(mul_div(u128::MAX, u128::MAX, u128::MAX).unwrap(), u128::MAX);
    }

    #[test]
    fn test_mul_div_rejects_quotient_beyond_u128() {
        assert!(mul_div(u128::MAX, 2, 1).is_err());
    }

    #[test]
    fn test_accrual_delta_large_budget_over_full_window() {
        // 150k SOL over 30 days, 1M units staked: elapsed * budget * 1e18 exceeds u128
        let (delta_primary, delta_secondary) = accrual_delta(
            THIRTY_DAYS,
            150_000 * SOL,
            THIRTY_DAYS,
            (1_000_000 * SOL) as u128,
            HALF,
        )
        .unwrap();
        assert_eq!(delta_primary, 150_000_000_000_000_000);
        assert_eq!(delta_secondary, 75_000_000_000_000_000);
    }

    #[test]
    fn test_mul_div_rejects_zero_denominator() {
        assert!(mul_div(1, 1, 0).is_err());
    }

    #[test]
    fn test_weighted_total_applies_weightage_to_secondary_only() {
        assert_eq!(weighted_total(10 * SOL, 0, HALF).unwrap(), 10 * SOL as u128);
        assert_eq!(weighted_total(0, 20 * SOL, HALF).unwrap(), 10 * SOL as u128);
        assert_eq!(weighted_total(3 * SOL, 4 * SOL, HALF).unwrap(), 5 * SOL as u128);
    }

    #[test]
    fn test_accrual_delta_single_primary_staker() {
        // 10 SOL over 30 days, 10 units staked, 5 seconds elapsed
        let (delta_primary, delta_secondary) =
            accrual_delta(5, 10 * SOL, THIRTY_DAYS, 10 * SOL as u128, HALF).unwrap();

        assert_eq!(delta_primary, 1_929_012_345_679);
        assert_eq!(delta_secondary, 964_506_172_839);
    }

    #[test]
    fn test_accrual_delta_is_zero_for_empty_pool() {
        assert_eq!(accrual_delta(100, 10 * SOL, THIRTY_DAYS, 0, HALF).unwrap(), (0, 0));
    }

    #[test]
    fn test_accrual_delta_is_zero_without_distribution_window() {
        assert_eq!(accrual_delta(100, 10 * SOL, 0, 1, HALF).unwrap(), (0, 0));
    }

    #[test]
    fn test_accrual_delta_survives_large_budgets() {
        // elapsed * budget * 1e18 exceeds u128, the split path must still produce a value
        let (delta_primary, _) =
            accrual_delta(THIRTY_DAYS, u64::MAX / 2, THIRTY_DAYS, 1, HALF).unwrap();
        assert_eq!(delta_primary, (u64::MAX / 2) as u128 * ACC_SCALE);
    }

    #[test]
    fn test_settlement_amount_truncates_to_lamports() {
        assert_eq!(settlement_amount(1_929_012_345_679, 0, 10 * SOL).unwrap(), 19_290);
        assert_eq!(settlement_amount(1_929_012_345_679, 1_929_012_345_679, 10 * SOL).unwrap(), 0);
    }

    #[test]
    fn test_settlement_amount_rejects_checkpoint_ahead_of_accumulator() {
        assert!(settlement_amount(1, 2, SOL).is_err());
    }

    #[test]
    fn test_unemitted_reward_halfway() {
        let end = 1_000 + THIRTY_DAYS;
        let now = 1_000 + THIRTY_DAYS / 2;
        assert_eq!(unemitted_reward(10 * SOL, THIRTY_DAYS, end, now).unwrap(), 5 * SOL);
    }

    #[test]
    fn test_unemitted_reward_after_period_end() {
        assert_eq!(unemitted_reward(10 * SOL, THIRTY_DAYS, 500, 500).unwrap(), 0);
        assert_eq!(unemitted_reward(10 * SOL, THIRTY_DAYS, 500, 900).unwrap(), 0);
    }
}
