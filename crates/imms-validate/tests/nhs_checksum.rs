//! Mod-11 checksum properties over generated digit strings.

use proptest::prelude::*;

use imms_validate::checks::nhs_number_mod11_check;

fn expected_check_digit(digits: &[u32; 9]) -> Option<u32> {
    let weighted: u32 = digits
        .iter()
        .zip((2..=10).rev())
        .map(|(digit, weight)| digit * weight)
        .sum();
    match 11 - (weighted % 11) {
        11 => Some(0),
        10 => None,
        n => Some(n),
    }
}

proptest! {
    #[test]
    fn only_the_derived_check_digit_passes(digits in proptest::array::uniform9(0u32..10)) {
        let prefix: String = digits.iter().map(|d| d.to_string()).collect();
        let expected = expected_check_digit(&digits);
        for candidate in 0..10u32 {
            let number = format!("{prefix}{candidate}");
            prop_assert_eq!(
                nhs_number_mod11_check(&number),
                expected == Some(candidate),
                "number {}",
                number
            );
        }
    }

    #[test]
    fn non_ten_digit_strings_never_pass(value in "[0-9]{0,9}|[0-9]{11,13}|[a-z ]{1,12}") {
        prop_assert!(!nhs_number_mod11_check(&value));
    }
}
