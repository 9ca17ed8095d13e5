//! Telephone-keypad decoding of DTMF digit sequences.
//!
//! Voice callers type commands on the phone keypad using the multi-tap
//! scheme: a run of the same digit selects a letter from that key
//! (`2` -> a, `22` -> b, `222` -> c, wrapping around), `0` produces a
//! space, and `1` terminates a run without emitting anything, so two
//! letters from the same key can follow each other (`2122` -> "ab").
//! Anything else - `#`, `*`, whitespace - just terminates the current run
//! and is dropped, which conveniently tolerates pauses and transport
//! artefacts.

/// Letters per keypad digit, in press order.
const KEYPAD: [(char, &str); 8] = [
    ('2', "abc"),
    ('3', "def"),
    ('4', "ghi"),
    ('5', "jkl"),
    ('6', "mno"),
    ('7', "pqrs"),
    ('8', "tuv"),
    ('9', "wxyz"),
];

/// Decode a DTMF digit sequence into letters and spaces.
pub fn decode(digits: &str) -> String {
    let mut out = String::new();
    let mut run_digit: Option<char> = None;
    let mut run_len = 0usize;

    let flush = |digit: Option<char>, len: usize, out: &mut String| {
        let Some(digit) = digit else { return };
        if len == 0 {
            return;
        }
        if digit == '0' {
            for _ in 0..len {
                out.push(' ');
            }
            return;
        }
        if let Some((_, letters)) = KEYPAD.iter().find(|(key, _)| *key == digit) {
            let index = (len - 1) % letters.len();
            // A key only holds single-byte letters.
            out.push(letters.as_bytes()[index] as char);
        }
    };

    for c in digits.chars() {
        match c {
            '0'..='9' if Some(c) == run_digit => run_len += 1,
            '0'..='9' => {
                flush(run_digit, run_len, &mut out);
                run_digit = Some(c);
                run_len = 1;
            }
            // '1' and everything else terminate the run silently.
            _ => {
                flush(run_digit, run_len, &mut out);
                run_digit = None;
                run_len = 0;
            }
        }
    }
    flush(run_digit, run_len, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_hello() {
        assert_eq!(decode("4433555 555666"), "hello");
    }

    #[test]
    fn zero_is_space() {
        assert_eq!(decode("440 4440"), "h i ");
        assert_eq!(decode("00"), "  ");
    }

    #[test]
    fn one_separates_runs_on_the_same_key() {
        assert_eq!(decode("2122"), "ab");
        assert_eq!(decode("21212"), "aaa");
    }

    #[test]
    fn runs_wrap_around_the_key() {
        // Four presses of '2' wrap back to 'a'.
        assert_eq!(decode("2222"), "a");
        // Five presses of '7' (pqrs) wrap to 'p'.
        assert_eq!(decode("77777"), "p");
    }

    #[test]
    fn artefacts_are_dropped() {
        assert_eq!(decode("44#33*555,555  666"), "hello");
        assert_eq!(decode(""), "");
        assert_eq!(decode("#*"), "");
    }

    #[test]
    fn one_alone_emits_nothing() {
        assert_eq!(decode("111"), "");
    }
}
