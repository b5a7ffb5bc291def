//! Macroses shared by the layers

/// Builds `ValidationErrors` by hand:
/// `validation_errors!({"field": ["code" => "message"]})`
#[macro_export]
macro_rules! validation_errors {
    ({$($field:tt: [$($code:expr => $message:expr),*]),*}) => {{
        use std::borrow::Cow;
        use std::collections::HashMap;
        use validator::{ValidationError, ValidationErrors};

        let mut errors = ValidationErrors::new();
        $($(
            errors.add($field, ValidationError {
                code: Cow::from($code),
                message: Some(Cow::from($message)),
                params: HashMap::new(),
            });
        )*)*
        errors
    }};
}
