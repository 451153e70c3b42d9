//! Wildcard matching for data source filters
//!
//! Fabric VLAN lookups accept glob-style name and description filters.
//! Two wildcards are supported:
//!
//! * `*` - matches any number of any characters including none; and
//! * `?` - matches one occurrence of any character.
//!
//! Patterns are implicitly anchored at both ends, and there is no support
//! for ranges or character classes. Matching is linear over the subject
//! with a single backtrack point, so pathological patterns cannot blow up.

/// Returns true when `s` matches `pattern` in full.
pub fn wildcard_match(pattern: &str, s: &str) -> bool {
    // Would always match.
    if pattern == "*" {
        return true;
    }

    let pattern = pattern.as_bytes();
    let s = s.as_bytes();

    let mut p = 0;
    let mut n = 0;
    let mut next_p = 0;
    let mut next_n = 0;

    while n < s.len() || p < pattern.len() {
        if p < pattern.len() {
            match pattern[p] {
                b'?' => {
                    if n < s.len() {
                        p += 1;
                        n += 1;
                        continue;
                    }
                }
                b'*' => {
                    next_p = p;
                    next_n = n + 1;
                    p += 1;
                    continue;
                }
                c => {
                    if n < s.len() && s[n] == c {
                        p += 1;
                        n += 1;
                        continue;
                    }
                }
            }
        }

        // Restart at the last star, consuming one more subject byte.
        if 0 < next_n && next_n <= s.len() {
            p = next_p;
            n = next_n;
            continue;
        }
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::wildcard_match;

    #[test]
    fn wildcard_match_table() {
        let cases: &[(&str, &str, bool)] = &[
            // (value, pattern, expected)
            ("", "", true),
            ("", "*", true),
            ("", "?", false),
            ("", "triton", false),
            ("triton", "", false),
            ("triton", "*", true),
            ("triton", "?", false),
            ("triton", "*n", true),
            ("triton", "?*", true),
            ("triton", "t*", true),
            ("triton", "t*n", true),
            ("triton", "?*n", true),
            ("triton", "triton", true),
            ("triton", "??????", true),
            ("triton", "trito?", true),
            ("triton", "?riton", true),
            ("triton", "t?it?n", true),
            ("triton", "*triton", true),
            ("triton", "triton*", true),
            ("triton", "?triton", false),
            ("triton", "triton?", false),
            ("txrxixtxoxnx", "t*r*i*t*o*nx", true),
            ("txrxixtxoxnn", "t*r*i*t*o*n*", true),
            ("trxrrxritonx", "t*r?t*o*n*x*", true),
            ("trxrrxritonn", "t*r?t*o*n*x", false),
        ];

        for (value, pattern, expected) in cases {
            assert_eq!(
                wildcard_match(pattern, value),
                *expected,
                "pattern {:?} against {:?}",
                pattern,
                value
            );
        }
    }
}
