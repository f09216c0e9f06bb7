use rendezvous_core::AppError;

const UNIQUE_VIOLATION: &str = "23505";

/// Maps a failed write: unique-key violations become validation errors,
/// everything else becomes a permission-service failure.
pub(crate) fn map_write_error(
    error: sqlx::Error,
    conflict_message: String,
    context: &str,
) -> AppError {
    if let sqlx::Error::Database(database_error) = &error
        && database_error.code().as_deref() == Some(UNIQUE_VIOLATION)
    {
        return AppError::Validation(conflict_message);
    }

    AppError::PermissionService(format!("{context}: {error}"))
}
