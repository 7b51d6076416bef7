//! Digit combinatorics shared by unit calculation and exposure matching.
//!
//! The canonical combination count of an inverted bet is the number of
//! unique strings obtainable by permuting its digits. It is computed as
//! a product of binomials, `C(n, k1) · C(n - k1, k2) · …`, which equals
//! `n! / ∏ kᵢ!` without ever forming `n!`.

use std::collections::BTreeMap;

/// Number of distinct permutations of the characters of `digits`.
///
/// `"1234"` → 24, `"1123"` → 12, `"1111"` → 1, `""` → 1.
/// Saturates at `u64::MAX` for inputs far longer than any bet.
pub fn distinct_permutations(digits: &str) -> u64 {
    let mut counts: BTreeMap<char, u64> = BTreeMap::new();
    for c in digits.chars() {
        *counts.entry(c).or_default() += 1;
    }

    let mut remaining: u64 = counts.values().sum();
    let mut total: u128 = 1;
    for &k in counts.values() {
        total = match binomial(remaining, k).and_then(|c| total.checked_mul(c)) {
            Some(t) => t,
            None => return u64::MAX,
        };
        remaining -= k;
    }
    u64::try_from(total).unwrap_or(u64::MAX)
}

/// Exact `C(n, k)`; `None` on overflow.
fn binomial(n: u64, k: u64) -> Option<u128> {
    let k = k.min(n - k);
    let mut acc: u128 = 1;
    for i in 0..k {
        // acc * (n - i) is always divisible by (i + 1) at this point.
        acc = acc.checked_mul(u128::from(n - i))? / u128::from(i + 1);
    }
    Some(acc)
}

/// Normalize a number to `target_digits` for bucket comparison.
///
/// Non-digit characters are dropped. Longer inputs keep their trailing
/// digits (a milhar `"4321"` read as a centena is `"321"`, as a dezena
/// `"21"`); shorter inputs are left-padded with `0` (`"7"` → `"07"`).
pub fn normalize(number: &str, target_digits: usize) -> String {
    let digits: Vec<char> = number.chars().filter(char::is_ascii_digit).collect();
    if digits.len() >= target_digits {
        digits[digits.len() - target_digits..].iter().collect()
    } else {
        let mut out = "0".repeat(target_digits - digits.len());
        out.extend(digits);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn brute_force(digits: &str) -> u64 {
        fn permute(prefix: String, rest: Vec<char>, seen: &mut HashSet<String>) {
            if rest.is_empty() {
                seen.insert(prefix);
                return;
            }
            for i in 0..rest.len() {
                let mut next = rest.clone();
                let c = next.remove(i);
                let mut p = prefix.clone();
                p.push(c);
                permute(p, next, seen);
            }
        }
        let mut seen = HashSet::new();
        permute(String::new(), digits.chars().collect(), &mut seen);
        seen.len() as u64
    }

    #[test]
    fn test_known_counts() {
        assert_eq!(distinct_permutations("1123"), 12);
        assert_eq!(distinct_permutations("1234"), 24);
        assert_eq!(distinct_permutations("1111"), 1);
        assert_eq!(distinct_permutations("1122"), 6);
        assert_eq!(distinct_permutations("112"), 3);
        assert_eq!(distinct_permutations("12"), 2);
        assert_eq!(distinct_permutations("77"), 1);
        assert_eq!(distinct_permutations(""), 1);
    }

    #[test]
    fn test_matches_brute_force_on_samples() {
        for s in ["0", "10", "100", "1010", "12345", "11223", "99999", "90909"] {
            assert_eq!(distinct_permutations(s), brute_force(s), "digits {s}");
        }
    }

    #[test]
    fn test_long_inputs_do_not_overflow() {
        assert_eq!(distinct_permutations(&"0123456789".repeat(2)), 2_375_880_867_360_000);
        assert_eq!(distinct_permutations(&"0123456789".repeat(10)), u64::MAX);
    }

    #[test]
    fn test_normalize_truncates_to_trailing_digits() {
        assert_eq!(normalize("4321", 4), "4321");
        assert_eq!(normalize("4321", 3), "321");
        assert_eq!(normalize("4321", 2), "21");
    }

    #[test]
    fn test_normalize_pads_short_inputs() {
        assert_eq!(normalize("7", 2), "07");
        assert_eq!(normalize("", 3), "000");
        assert_eq!(normalize("12", 4), "0012");
    }

    #[test]
    fn test_normalize_drops_non_digits() {
        assert_eq!(normalize(" 12-34 ", 4), "1234");
        assert_eq!(normalize("a5b", 2), "05");
    }
}
