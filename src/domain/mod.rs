use std::borrow::Cow;
use validator::ValidationError;

pub mod project;
pub mod task;
pub mod user;

#[cfg(test)]
pub mod test_util;

/// Characters which may not appear in user-entered titles and task text
pub const FORBIDDEN_TEXT_CHARS: [char; 5] = ['<', '>', '&', '"', '\''];

/// Custom validator rejecting text that contains any of [FORBIDDEN_TEXT_CHARS]
pub fn reject_forbidden_chars(text: &str) -> Result<(), ValidationError> {
    if text.contains(FORBIDDEN_TEXT_CHARS) {
        let mut error = ValidationError::new("forbidden_chars");
        error.message = Some(Cow::from("Text contains invalid characters."));
        return Err(error);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use speculoos::prelude::*;

    #[test]
    fn accepts_plain_text() {
        assert_that!(reject_forbidden_chars("Groceries for the week (v2)!")).is_ok();
    }

    #[test]
    fn rejects_each_forbidden_char() {
        for bad_char in FORBIDDEN_TEXT_CHARS {
            let text = format!("before{bad_char}after");
            let result = reject_forbidden_chars(&text);
            assert_that!(result)
                .is_err()
                .matches(|err| err.code == "forbidden_chars");
        }
    }
}
