use crate::constants::LAMPORTS_PER_SOL;
use rust_decimal::prelude::*;

/// Convert SOL to lamports, truncating fractional lamports
pub fn sol_to_lamports(sol: Decimal) -> u64 {
    (sol * Decimal::from(LAMPORTS_PER_SOL))
        .trunc()
        .to_u64()
        .unwrap_or(0)
}

/// Convert lamports to SOL
pub fn lamports_to_sol(lamports: u64) -> Decimal {
    Decimal::from(lamports) / Decimal::from(LAMPORTS_PER_SOL)
}

/// Scale an integer amount by a decimal factor, truncating toward zero.
///
/// Used for trade sizing (fraction of balance) and priority-fee escalation.
pub fn scale_amount(amount: u64, factor: Decimal) -> u64 {
    (Decimal::from(amount) * factor)
        .trunc()
        .to_u64()
        .unwrap_or(0)
}
