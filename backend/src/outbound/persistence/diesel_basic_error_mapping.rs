//! Shared Diesel error mapping for repositories with connection/query errors.

use tracing::debug;

use super::pool::PoolError;

/// Map pool errors into a repository-specific connection error.
pub(crate) fn map_basic_pool_error<E, C>(error: PoolError, connection: C) -> E
where
    C: FnOnce(String) -> E,
{
    let message = match error {
        PoolError::Checkout { message } | PoolError::Build { message } => message,
    };
    connection(message)
}

/// Map Diesel errors into query or connection errors.
///
/// Only a closed connection counts as a connection failure; everything else
/// is reported as a query failure. Driver messages are logged at `debug` and
/// not forwarded, as they can echo bound values.
pub(crate) fn map_basic_diesel_error<E, Q, C>(
    error: diesel::result::Error,
    query: Q,
    connection: C,
) -> E
where
    Q: FnOnce(&'static str) -> E,
    C: FnOnce(&'static str) -> E,
{
    use diesel::result::{DatabaseErrorKind, Error as DieselError};

    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), "diesel operation failed");
        }
        _ => debug!(error = %error, "diesel operation failed"),
    }

    match error {
        DieselError::NotFound => query("record not found"),
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            connection("database connection error")
        }
        DieselError::DatabaseError(DatabaseErrorKind::SerializationFailure, _) => {
            query("concurrent update, retry")
        }
        _ => query("database error"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::MembershipRepositoryError;
    use rstest::rstest;

    fn map(error: diesel::result::Error) -> MembershipRepositoryError {
        map_basic_diesel_error(
            error,
            MembershipRepositoryError::query,
            MembershipRepositoryError::connection,
        )
    }

    #[rstest]
    fn not_found_is_a_query_error() {
        assert_eq!(
            map(diesel::result::Error::NotFound),
            MembershipRepositoryError::query("record not found")
        );
    }

    #[rstest]
    fn pool_errors_become_connection_errors() {
        let mapped = map_basic_pool_error(
            PoolError::checkout("timed out"),
            MembershipRepositoryError::connection,
        );
        assert_eq!(mapped, MembershipRepositoryError::connection("timed out"));
    }
}
