//! Customer-data checks run before any outbound payment call.

use lazy_static::lazy_static;
use regex::Regex;
use validator::{Validate, ValidationError};

use crate::errors::ServiceError;

lazy_static! {
    static ref POSTAL_CODE: Regex = Regex::new(r"^\d{5}-?\d{3}$").expect("valid postal code regex");
}

const CNPJ_WEIGHTS: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];

/// Validate any input that implements Validate trait
pub fn validate_input<T: Validate>(input: &T) -> Result<(), ServiceError> {
    input
        .validate()
        .map_err(|e| ServiceError::InvalidInput(format!("Validation failed: {}", e)))
}

fn digits_of(value: &str) -> Vec<u32> {
    value.chars().filter_map(|c| c.to_digit(10)).collect()
}

fn all_same(digits: &[u32]) -> bool {
    digits.windows(2).all(|pair| pair[0] == pair[1])
}

/// CPF (individual taxpayer id) with valid check digits. Punctuation is ignored.
pub fn is_valid_cpf(value: &str) -> bool {
    let digits = digits_of(value);
    if digits.len() != 11 || all_same(&digits) {
        return false;
    }
    [9usize, 10].iter().all(|&n| {
        let sum: u32 = (0..n).map(|i| digits[i] * (n as u32 + 1 - i as u32)).sum();
        let check = (sum * 10) % 11 % 10;
        check == digits[n]
    })
}

/// CNPJ (company taxpayer id) with valid check digits. Punctuation is ignored.
pub fn is_valid_cnpj(value: &str) -> bool {
    let digits = digits_of(value);
    if digits.len() != 14 || all_same(&digits) {
        return false;
    }
    [12usize, 13].iter().all(|&n| {
        let weights = &CNPJ_WEIGHTS[13 - n..];
        let sum: u32 = (0..n).map(|i| digits[i] * weights[i]).sum();
        let rest = sum % 11;
        let check = if rest < 2 { 0 } else { 11 - rest };
        check == digits[n]
    })
}

/// Validator hook for a CPF-or-CNPJ field.
pub fn validate_tax_document(value: &str) -> Result<(), ValidationError> {
    if is_valid_cpf(value) || is_valid_cnpj(value) {
        Ok(())
    } else {
        let mut err = ValidationError::new("tax_document");
        err.message = Some("CPF/CNPJ inválido".into());
        Err(err)
    }
}

/// Validator hook for a Brazilian postal code (CEP).
pub fn validate_postal_code(value: &str) -> Result<(), ValidationError> {
    if POSTAL_CODE.is_match(value.trim()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("postal_code");
        err.message = Some("CEP inválido".into());
        Err(err)
    }
}

/// Validator hook for a phone number with area code (10 or 11 digits).
pub fn validate_phone(value: &str) -> Result<(), ValidationError> {
    let count = digits_of(value).len();
    if (10..=11).contains(&count) {
        Ok(())
    } else {
        let mut err = ValidationError::new("phone");
        err.message = Some("Telefone inválido".into());
        Err(err)
    }
}
