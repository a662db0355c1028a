//! Building blocks for multi-statement transactions.
//!
//! Transactions are sent as a single query string. A failed guard
//! THROWs, which cancels every statement in the transaction; callers
//! then re-read state to report a precise error instead of parsing the
//! thrown message.
//!
//! Every write to a tenant row serializes with every other one, so a
//! rejected transaction whose re-read finds nothing wrong is retried
//! after a jittered backoff, up to [`MAX_TX_ATTEMPTS`] times.

use std::time::Duration;

use uuid::Uuid;

/// Attempts per transactional write before reporting contention.
pub(crate) const MAX_TX_ATTEMPTS: u32 = 12;

const BACKOFF_BASE_MS: u64 = 5;
const BACKOFF_MAX_SHIFT: u32 = 6;

/// Touch a live tenant row or abort. Writing the row makes a concurrent
/// tenant deletion conflict with the enclosing transaction.
pub(crate) const TENANT_GUARD: &str = "\
IF array::len((UPDATE type::record('tenant', $tenant_id) \
SET revision += 1 WHERE status != 'deleted')) = 0 \
{ THROW 'tenant is missing or deleted'; };";

/// Touch a non-revoked membership row or abort.
pub(crate) const MEMBERSHIP_GUARD: &str = "\
IF array::len((UPDATE type::record('membership', $id) \
SET updated_at = time::now() WHERE status != 'revoked')) = 0 \
{ THROW 'membership is missing or revoked'; };";

/// Wrap statements in `BEGIN`/`COMMIT`.
pub(crate) fn transaction<I, S>(statements: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut query = String::from("BEGIN TRANSACTION;\n");
    for statement in statements {
        query.push_str(statement.as_ref());
        query.push('\n');
    }
    query.push_str("COMMIT TRANSACTION;");
    query
}

/// One RELATE statement per target.
///
/// RELATE requires literal record-id syntax, so ids are embedded
/// directly; they are UUIDs and cannot carry SurrealQL.
pub(crate) fn relate_all(
    from_table: &str,
    from_id: Uuid,
    edge: &str,
    to_table: &str,
    to_ids: &[Uuid],
) -> Vec<String> {
    to_ids
        .iter()
        .map(|to_id| {
            format!("RELATE {from_table}:`{from_id}` -> {edge} -> {to_table}:`{to_id}`;")
        })
        .collect()
}

/// Delay before retry number `attempt` (1-based): exponential with
/// full jitter, capped at 64 base units.
pub(crate) fn backoff_delay(attempt: u32) -> Duration {
    let ceiling = BACKOFF_BASE_MS << attempt.min(BACKOFF_MAX_SHIFT);
    let jitter = (Uuid::new_v4().as_u128() % u128::from(ceiling)) as u64;
    Duration::from_millis(ceiling / 2 + jitter / 2)
}

pub(crate) async fn backoff(attempt: u32) {
    tokio::time::sleep(backoff_delay(attempt)).await;
}

pub(crate) fn id_strings(ids: &[Uuid]) -> Vec<String> {
    ids.iter().map(Uuid::to_string).collect()
}
