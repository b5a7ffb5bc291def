use diesel::result::{DatabaseErrorKind, Error as DieselError};
use failure::{Context, Error as FailureError};
use validator::ValidationErrors;

#[derive(Debug, Fail)]
pub enum Error {
    #[fail(display = "Not found")]
    NotFound,
    #[fail(display = "Parse error")]
    Parse,
    #[fail(display = "Validation error: {}", _0)]
    Validate(ValidationErrors),
    #[fail(display = "Server is refusing to fullfil the request")]
    Forbidden,
    #[fail(display = "R2D2 connection error")]
    Connection,
    #[fail(display = "Promo code is expired or inactive")]
    Inactive,
    #[fail(display = "Minimum order amount of {} required", _0)]
    BelowMinimum(f64),
    #[fail(display = "You have reached the usage limit for this promo code")]
    UsageLimitReached,
    #[fail(display = "You have reached the usage limit for this promo code")]
    PerUserLimitReached,
    #[fail(display = "Promo code was changed by a concurrent request")]
    Conflict,
}

impl Error {
    /// Finds the first `Error` kind in the cause chain of `e`
    pub fn kind_of(e: &FailureError) -> Option<&Error> {
        for cause in e.iter_chain() {
            if let Some(ctx) = cause.downcast_ref::<Context<Error>>() {
                return Some(ctx.get_context());
            }
            if let Some(kind) = cause.downcast_ref::<Error>() {
                return Some(kind);
            }
        }
        None
    }

    /// Http status code the error should be rendered with
    pub fn code(&self) -> u16 {
        match *self {
            Error::NotFound => 404,
            Error::Parse => 422,
            Error::Validate(_) | Error::Inactive | Error::BelowMinimum(_) | Error::UsageLimitReached | Error::PerUserLimitReached => 400,
            Error::Forbidden => 403,
            Error::Conflict => 409,
            Error::Connection => 500,
        }
    }
}

/// Status code for any error, 500 when no kind is attached
pub fn error_code(e: &FailureError) -> u16 {
    Error::kind_of(e).map(Error::code).unwrap_or(500)
}

/// Converts diesel errors into the app error chain. Unique violations
/// on promo code are reported as validation errors.
pub fn from_diesel(e: DieselError) -> FailureError {
    match e {
        DieselError::NotFound => format_err!("{}", e).context(Error::NotFound).into(),
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, ref info) => {
            let message = info.message().to_string();
            format_err!("{}", message)
                .context(Error::Validate(
                    validation_errors!({"code": ["code" => "Promo code already exists"]}),
                )).into()
        }
        other => FailureError::from(other),
    }
}
