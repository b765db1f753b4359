//! MICR line string parsing.
//!
//! The E-13B row encodes routing, account and cheque numbers between four
//! control symbols: Transit `T`, On-Us `U`, Amount `A` and Dash `D`. The
//! parser consumes a token stream of control symbols and decimal digit
//! runs; any other character only terminates the current digit run.

use serde::Serialize;

/// Structured fields recovered from one MICR string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MicrFields {
    pub routing_number: String,
    pub account_number: String,
    pub check_number: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub amount: String,
    pub micr_line: String,
}

/// Remap the legacy `A→T, B→A, C→U` symbol aliases.
///
/// The legacy alphabet is detected by the presence of `C`, which the
/// canonical alphabet never uses; the remap then applies to the whole
/// string.
fn normalize(input: &str) -> String {
    if !input.contains('C') {
        return input.to_string();
    }
    input
        .chars()
        .map(|c| match c {
            'A' => 'T',
            'B' => 'A',
            'C' => 'U',
            other => other,
        })
        .collect()
}

enum Token {
    Control(char),
    Digits(String),
}

fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut run = String::new();
    for c in input.chars() {
        if c.is_ascii_digit() {
            run.push(c);
            continue;
        }
        if !run.is_empty() {
            tokens.push(Token::Digits(std::mem::take(&mut run)));
        }
        if matches!(c, 'T' | 'U' | 'A' | 'D') {
            tokens.push(Token::Control(c));
        }
    }
    if !run.is_empty() {
        tokens.push(Token::Digits(run));
    }
    tokens
}

/// Parse a MICR string into its structured fields.
///
/// The result is a function of the normalized input alone; `micr_line`
/// carries the normalized string back to the caller.
pub fn parse(input: &str) -> MicrFields {
    let line = normalize(input);

    let mut fields = MicrFields {
        micr_line: line.clone(),
        ..Default::default()
    };

    let mut last_control: Option<char> = None;
    let (mut tc, mut ac, mut dc) = (0u32, 0u32, 0u32);

    for token in tokenize(&line) {
        match token {
            Token::Control(c) => {
                match c {
                    'T' => tc += 1,
                    'A' => ac += 1,
                    'D' => dc += 1,
                    _ => {}
                }
                last_control = Some(c);
            }
            Token::Digits(run) => {
                let handled = match last_control {
                    Some('T') => {
                        if fields.routing_number.is_empty() {
                            fields.routing_number = run.clone();
                        } else if fields.account_number.is_empty() {
                            fields.account_number = run.clone();
                        } else if fields.check_number.is_empty() {
                            fields.check_number = run.clone();
                        }
                        true
                    }
                    Some('A') if ac == 1 => {
                        fields.amount = run.clone();
                        true
                    }
                    Some('D') if dc == 1 => true,
                    // Auxiliary on-us ahead of the transit field carries the
                    // cheque number.
                    Some('U') if tc == 0 => {
                        if fields.check_number.is_empty() {
                            fields.check_number = run.clone();
                        }
                        true
                    }
                    _ => false,
                };
                if !handled && !fields.routing_number.is_empty() {
                    if fields.account_number.is_empty() {
                        fields.account_number = run;
                    } else if fields.check_number.is_empty() {
                        fields.check_number = run;
                    }
                }
            }
        }
    }

    fields.check_number = fields.check_number.trim_start_matches('0').to_string();
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_transit_and_on_us_fields() {
        let f = parse("T123T456U789");
        assert_eq!(f.routing_number, "123");
        assert_eq!(f.account_number, "456");
        assert_eq!(f.check_number, "789");
        assert_eq!(f.micr_line, "T123T456U789");
    }

    #[test]
    fn auxiliary_on_us_before_transit_is_the_cheque_number() {
        let f = parse("U12U T34T 56");
        assert_eq!(f.check_number, "12");
        assert_eq!(f.routing_number, "34");
        assert_eq!(f.account_number, "56");
    }

    #[test]
    fn legacy_alphabet_is_remapped_when_c_appears() {
        let f = parse("C12C A34A 56");
        assert_eq!(f.check_number, "12");
        assert_eq!(f.routing_number, "34");
        assert_eq!(f.account_number, "56");
        assert_eq!(f.micr_line, "U12U T34T 56");
    }

    #[test]
    fn literal_a_without_c_is_the_amount_symbol() {
        // No C anywhere, so no remap: the run between the A pair is an
        // amount, not a routing number.
        let f = parse("A34A");
        assert_eq!(f.amount, "34");
        assert_eq!(f.routing_number, "");
    }

    #[test]
    fn cheque_number_leading_zeros_are_stripped() {
        let f = parse("T012T034U056");
        assert_eq!(f.routing_number, "012");
        assert_eq!(f.account_number, "034");
        assert_eq!(f.check_number, "56");
    }

    #[test]
    fn empty_input_yields_empty_fields() {
        let f = parse("");
        assert_eq!(f, MicrFields::default());
    }

    #[test]
    fn dash_delimited_run_is_skipped() {
        let f = parse("T123TD99D456");
        assert_eq!(f.routing_number, "123");
        // The run inside the dash pair is ignored; the next run fills the
        // account.
        assert_eq!(f.account_number, "456");
    }
}
