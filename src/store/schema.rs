//! PostgreSQL schema for the ledger
//!
//! Money columns are `NUMERIC(20,4)`; the largest representable balance is
//! therefore 9999999999999999.9999, which is the default `ledger.max_balance`.
//! Transfer rows use the same width so any credit that passes the ceiling
//! check is storable. Rates are `NUMERIC(28,12)` to hold every rate the
//! oracle accepts without rounding.

use sqlx::PgPool;

use super::StoreError;

pub const CREATE_CURRENCY_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS currency (
    currency_code CHAR(3) PRIMARY KEY,
    currency_name VARCHAR(50) NOT NULL
)
"#;

pub const CREATE_ACCOUNT_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS account (
    account_id    BIGSERIAL PRIMARY KEY,
    name          VARCHAR(100) NOT NULL,
    currency_code CHAR(3) NOT NULL REFERENCES currency (currency_code),
    balance       NUMERIC(20, 4) NOT NULL CHECK (balance >= 0)
)
"#;

pub const CREATE_TRANSFER_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS transfer (
    transfer_id         BIGSERIAL PRIMARY KEY,
    from_account_id_raw BIGINT NOT NULL,
    to_account_id_raw   BIGINT NOT NULL,
    amount              NUMERIC(20, 4) NOT NULL,
    currency            CHAR(3) NOT NULL,
    currency_from       CHAR(3),
    currency_to         CHAR(3),
    fee_applied         NUMERIC(20, 4),
    fx_rate             NUMERIC(28, 12),
    debit_amount        NUMERIC(20, 4),
    credit_amount       NUMERIC(20, 4),
    transfer_time       TIMESTAMPTZ NOT NULL,
    state               VARCHAR(20) NOT NULL
)
"#;

pub const CREATE_TRANSFER_POLICY_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS transfer_policy (
    policy_name  VARCHAR(100) PRIMARY KEY,
    policy_value NUMERIC(28, 12) NOT NULL,
    enabled      BOOLEAN NOT NULL DEFAULT TRUE
)
"#;

/// Widen money and rate columns created by earlier schema versions
pub const WIDEN_TRANSFER_COLUMNS: &str = r#"
ALTER TABLE transfer
    ALTER COLUMN amount        TYPE NUMERIC(20, 4),
    ALTER COLUMN fee_applied   TYPE NUMERIC(20, 4),
    ALTER COLUMN fx_rate       TYPE NUMERIC(28, 12),
    ALTER COLUMN debit_amount  TYPE NUMERIC(20, 4),
    ALTER COLUMN credit_amount TYPE NUMERIC(20, 4)
"#;

pub const WIDEN_POLICY_VALUE: &str =
    "ALTER TABLE transfer_policy ALTER COLUMN policy_value TYPE NUMERIC(28, 12)";

/// Create all ledger tables if they do not exist
pub async fn init_schema(pool: &PgPool) -> Result<(), StoreError> {
    tracing::info!("Initializing ledger schema...");

    for ddl in [
        CREATE_CURRENCY_TABLE,
        CREATE_ACCOUNT_TABLE,
        CREATE_TRANSFER_TABLE,
        CREATE_TRANSFER_POLICY_TABLE,
        WIDEN_TRANSFER_COLUMNS,
        WIDEN_POLICY_VALUE,
    ] {
        sqlx::query(ddl).execute(pool).await?;
    }

    tracing::info!("Ledger schema ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balance_column_rejects_negative() {
        assert!(CREATE_ACCOUNT_TABLE.contains("CHECK (balance >= 0)"));
        assert!(CREATE_ACCOUNT_TABLE.contains("NUMERIC(20, 4)"));
    }

    #[test]
    fn test_transfer_money_columns_match_balance_width() {
        for column in ["amount", "fee_applied", "debit_amount", "credit_amount"] {
            let line = CREATE_TRANSFER_TABLE
                .lines()
                .find(|l| l.trim_start().starts_with(&format!("{} ", column)))
                .unwrap();
            assert!(line.contains("NUMERIC(20, 4)"), "{}", line);
        }
        assert!(!CREATE_TRANSFER_TABLE.contains("NUMERIC(19"));
    }

    #[test]
    fn test_rate_column_holds_oracle_scale() {
        use crate::transfer::fx::MAX_RATE_SCALE;
        let line = CREATE_TRANSFER_TABLE
            .lines()
            .find(|l| l.trim_start().starts_with("fx_rate "))
            .unwrap();
        assert!(line.contains(&format!("NUMERIC(28, {})", MAX_RATE_SCALE)));
    }

    #[test]
    fn test_transfer_table_keeps_raw_ids() {
        assert!(CREATE_TRANSFER_TABLE.contains("from_account_id_raw"));
        assert!(CREATE_TRANSFER_TABLE.contains("to_account_id_raw"));
        // Raw ids are not foreign keys so intents for unknown accounts persist
        assert!(!CREATE_TRANSFER_TABLE.contains("REFERENCES account"));
    }
}
