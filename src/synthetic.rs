//! Seeded generator of linearly separable purchase records.

use crate::data::PurchaseRecord;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Generates `n` records with genders `Male`/`Female`.
///
/// A customer purchases again when
/// `amount - 5 + 0.02 * (age - 44) ± 0.5 (Female/Male) > 0`.
pub fn generate(n: usize, seed: u64) -> Vec<PurchaseRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let age = rng.random_range(18..=70) as f64;
            let female = rng.random_bool(0.5);
            let amount = (rng.random_range(0.0..10.0_f64) * 100.0).round() / 100.0;
            let margin = amount - 5.0 + 0.02 * (age - 44.0) + if female { 0.5 } else { -0.5 };

            PurchaseRecord {
                customer_id: i.to_string(),
                age_count: age,
                gender_type: if female { "Female" } else { "Male" }.to_string(),
                prepurchase_amount: amount,
                purchase_again: margin > 0.0,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_seeded() {
        let a = generate(50, 9);
        assert_eq!(a, generate(50, 9));
        assert_ne!(a, generate(50, 10));
        assert!(a.iter().any(|r| r.purchase_again));
        assert!(a.iter().any(|r| !r.purchase_again));
    }
}
