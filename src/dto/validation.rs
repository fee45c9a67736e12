//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::dto::session::QuestionInput;

/// Number of digits of a session PIN.
pub const PIN_LENGTH: usize = 6;
/// Longest accepted player name, counted in characters after trimming.
pub const MAX_PLAYER_NAME_CHARS: usize = 32;

/// Validates that a PIN is exactly 6 ASCII digits without a leading zero.
///
/// # Examples
///
/// ```ignore
/// validate_pin("482913") // Ok
/// validate_pin("082913") // Err - leading zero
/// validate_pin("48291")  // Err - too short
/// ```
pub fn validate_pin(pin: &str) -> Result<(), ValidationError> {
    if pin.len() != PIN_LENGTH {
        let mut err = ValidationError::new("pin_length");
        err.message = Some(format!("PIN must be exactly {PIN_LENGTH} digits (got {})", pin.len()).into());
        return Err(err);
    }

    if !pin.bytes().all(|b| b.is_ascii_digit()) || pin.starts_with('0') {
        let mut err = ValidationError::new("pin_format");
        err.message = Some("PIN must be a number between 100000 and 999999".into());
        return Err(err);
    }

    Ok(())
}

/// Rejects strings that are empty once surrounding whitespace is removed.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("value must not be blank".into());
        return Err(err);
    }
    Ok(())
}

/// Validates a player name: 1 to 32 characters once trimmed.
pub fn validate_player_name(name: &str) -> Result<(), ValidationError> {
    validate_not_blank(name)?;

    let chars = name.trim().chars().count();
    if chars > MAX_PLAYER_NAME_CHARS {
        let mut err = ValidationError::new("player_name_length");
        err.message = Some(
            format!("player name must be at most {MAX_PLAYER_NAME_CHARS} characters (got {chars})")
                .into(),
        );
        return Err(err);
    }

    Ok(())
}

/// Requires at least one answer of the question to be flagged as correct.
pub fn validate_has_correct_answer(question: &QuestionInput) -> Result<(), ValidationError> {
    if question.answers.iter().any(|answer| answer.is_correct) {
        Ok(())
    } else {
        let mut err = ValidationError::new("no_correct_answer");
        err.message = Some("each question needs a correct answer".into());
        Err(err)
    }
}
