//! Map sqlx errors onto store fault kinds.

use std::io;

use crate::fault::{kinds, StoreFault};

/// SQLite result codes meaning another connection holds the lock
/// (`SQLITE_BUSY`, `SQLITE_LOCKED` and their extended forms).
const BUSY_CODES: &[&str] = &["5", "6", "261", "262", "517"];

pub(crate) fn fault_from_sqlx(err: sqlx::Error) -> StoreFault {
    let kind = match &err {
        sqlx::Error::Io(e) => match e.kind() {
            io::ErrorKind::ConnectionRefused => kinds::SOCKET_OPEN,
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::TimedOut => kinds::SOCKET_READ,
            _ => kinds::INTERNAL,
        },
        sqlx::Error::PoolTimedOut => kinds::POOL_TIMED_OUT,
        sqlx::Error::PoolClosed => kinds::POOL_CLOSED,
        sqlx::Error::Database(db) if db.is_unique_violation() => kinds::DUPLICATE_KEY,
        sqlx::Error::Database(db) => match db.code() {
            Some(code) if BUSY_CODES.iter().any(|c| *c == code) => kinds::NODE_IS_RECOVERING,
            _ => kinds::DATABASE,
        },
        _ => kinds::INTERNAL,
    };
    StoreFault::new(kind, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn io_err(kind: io::ErrorKind) -> sqlx::Error {
        sqlx::Error::Io(io::Error::from(kind))
    }

    #[test]
    fn socket_faults() {
        assert_eq!(
            fault_from_sqlx(io_err(io::ErrorKind::ConnectionRefused)).kind(),
            kinds::SOCKET_OPEN
        );
        for k in [
            io::ErrorKind::ConnectionReset,
            io::ErrorKind::BrokenPipe,
            io::ErrorKind::UnexpectedEof,
        ] {
            assert_eq!(fault_from_sqlx(io_err(k)).kind(), kinds::SOCKET_READ);
        }
        for k in [io::ErrorKind::PermissionDenied, io::ErrorKind::NotFound] {
            assert_eq!(fault_from_sqlx(io_err(k)).kind(), kinds::INTERNAL);
        }
    }

    #[test]
    fn pool_faults() {
        assert_eq!(fault_from_sqlx(sqlx::Error::PoolTimedOut).kind(), kinds::POOL_TIMED_OUT);
        assert_eq!(fault_from_sqlx(sqlx::Error::PoolClosed).kind(), kinds::POOL_CLOSED);
    }

    #[test]
    fn other_errors_are_internal() {
        let f = fault_from_sqlx(sqlx::Error::RowNotFound);
        assert_eq!(f.kind(), kinds::INTERNAL);
        assert!(!f.message().is_empty());
    }
}
