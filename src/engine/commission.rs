// ============================================================================
// Commission Calculator
// ============================================================================
//
// Pure arithmetic over the commissionable base and the owning tenant's rate
// at settlement time. The result is snapshotted onto the order and never
// recalculated, even if the tenant's live rate changes later.
//
// ============================================================================

/// One settlement's worth of money, in paise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settlement {
    pub base: i64,
    pub rate: f64,
    pub commission: i64,
    pub net_to_tenant: i64,
}

/// Derive commission from `base` (paise) and `rate` (percent).
/// Rounds to the smallest currency unit, half up - no fractional paise.
/// A non-positive base settles zero commission; the platform never takes
/// money on an order that collected none.
pub fn settle(base: i64, rate: f64) -> Settlement {
    let commission = if base > 0 {
        round_half_up(base as f64 * rate / 100.0)
    } else {
        0
    };
    Settlement {
        base,
        rate,
        commission,
        net_to_tenant: base - commission,
    }
}

fn round_half_up(amount: f64) -> i64 {
    (amount + 0.5).floor() as i64
}
