//! The target predicate: which lines are worth claiming.
//!
//! A line is a target when, after removing every space character, it is
//! non-empty, not made only of the digits `0-9`, and reads the same in both
//! directions. The comparison is case-sensitive and works on Unicode scalar
//! values. Only `' '` is stripped; tabs and other whitespace are kept.
//!
//! The digit rule also keeps claim markers (`"3 3 3 "`) from ever matching
//! again.

/// Remove every space character from `line`.
pub fn normalize(line: &str) -> String {
    line.chars().filter(|c| *c != ' ').collect()
}

/// Whether `line` is a claimable palindrome.
pub fn is_target(line: &str) -> bool {
    let chars: Vec<char> = line.chars().filter(|c| *c != ' ').collect();

    if chars.is_empty() {
        return false;
    }
    if chars.iter().all(|c| c.is_ascii_digit()) {
        return false;
    }

    chars.iter().eq(chars.iter().rev())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn plain_palindrome_matches() {
        assert!(is_target("anna"));
        assert!(is_target("x"));
    }

    #[test]
    fn numeric_only_is_excluded() {
        assert!(!is_target("12321"));
        assert!(!is_target("1 2 1"));
        assert!(!is_target("7"));
    }

    #[test]
    fn mixed_digits_and_letters_can_match() {
        assert!(is_target("1a1"));
    }

    #[test]
    fn empty_and_blank_lines_never_match() {
        assert!(!is_target(""));
        assert!(!is_target("    "));
    }

    #[test]
    fn spaces_are_ignored() {
        assert!(is_target("a b a"));
        assert!(is_target(" ab  ba "));
        assert_eq!(normalize(" a b a "), "aba");
    }

    #[test]
    fn non_palindromes_and_case() {
        assert!(!is_target("abc"));
        assert!(!is_target("Anna"));
        // Tabs are not stripped.
        assert!(!is_target("a\tb a"));
    }

    #[test]
    fn unicode_is_compared_per_char() {
        assert!(is_target("añña"));
        assert!(!is_target("añn"));
    }

    proptest! {
        #[test]
        fn mirrored_letters_always_match(half in "[a-z]{1,8}", middle in prop::option::of("[a-z]")) {
            let mut line = half.clone();
            if let Some(m) = &middle {
                line.push_str(m);
            }
            line.extend(half.chars().rev());
            prop_assert!(is_target(&line));
        }

        #[test]
        fn digit_strings_never_match(digits in "[0-9 ]{0,12}") {
            prop_assert!(!is_target(&digits));
        }

        #[test]
        fn inserting_spaces_does_not_change_the_answer(line in "[ab]{0,8}", at in 0usize..9) {
            let at = at.min(line.len());
            let mut spaced = line.clone();
            spaced.insert(at, ' ');
            prop_assert_eq!(is_target(&line), is_target(&spaced));
        }
    }
}
