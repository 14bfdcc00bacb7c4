//! 스키마 마이그레이션.
//!
//! 버전 기반 SQLite 스키마 관리.

use rusqlite::Connection;
use tracing::{debug, info};

/// 현재 스키마 버전
const CURRENT_VERSION: u32 = 2;

/// 스키마 마이그레이션 실행
pub fn run_migrations(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let current = get_version(conn)?;
    info!("현재 스키마 버전: {current}, 목표: {CURRENT_VERSION}");

    if current < 1 {
        migrate_v1(conn)?;
    }

    if current < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// 현재 스키마 버전 조회
pub fn get_version(conn: &Connection) -> Result<u32, rusqlite::Error> {
    let result: Result<u32, _> = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    );
    result.or(Ok(0))
}

/// V1: run_records 테이블
fn migrate_v1(conn: &Connection) -> Result<(), rusqlite::Error> {
    debug!("마이그레이션 V1 실행: run_records 테이블");

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS run_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT NOT NULL UNIQUE,
            status TEXT NOT NULL,
            failed_stage TEXT,
            timestamp TEXT NOT NULL,
            payload TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        INSERT INTO schema_version (version) VALUES (1);
        ",
    )?;

    Ok(())
}

/// V2: 판정/구동 컬럼 + 인덱스
///
/// 대시보드 필터링용 비정규화 컬럼. 원본은 항상 `payload`.
fn migrate_v2(conn: &Connection) -> Result<(), rusqlite::Error> {
    debug!("마이그레이션 V2 실행: 판정 컬럼 + 인덱스");

    conn.execute_batch(
        "
        ALTER TABLE run_records ADD COLUMN disease_label TEXT;
        ALTER TABLE run_records ADD COLUMN severity REAL;
        ALTER TABLE run_records ADD COLUMN action TEXT NOT NULL DEFAULT 'off';
        ALTER TABLE run_records ADD COLUMN executed INTEGER;

        CREATE INDEX IF NOT EXISTS idx_run_records_timestamp ON run_records(timestamp);
        CREATE INDEX IF NOT EXISTS idx_run_records_status ON run_records(status);

        INSERT INTO schema_version (version) VALUES (2);
        ",
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_reach_current_version() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        assert_eq!(get_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
        assert_eq!(get_version(&conn).unwrap(), CURRENT_VERSION);

        let versions: u32 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(versions, CURRENT_VERSION);
    }

    #[test]
    fn v2_columns_exist() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn.execute(
            "INSERT INTO run_records (run_id, status, timestamp, payload, disease_label, severity, action, executed)
             VALUES ('r1', 'success', '2026-01-01T00:00:00Z', '{}', 'rust', 42.0, 'on', 1)",
            [],
        )
        .unwrap();
        let action: String = conn
            .query_row("SELECT action FROM run_records WHERE run_id = 'r1'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(action, "on");
    }
}
