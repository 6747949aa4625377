use anyhow::Context;

// Transaction-scoped advisory locks serialize read-modify-write of one log key
// across every connection. Released automatically at commit or rollback.
const LOCK_NAMESPACE: i64 = 0x4556_4D53_434C; // "EVMSCL" as hex-ish namespace.

pub(crate) fn lock_key_for_log(log_key: &str) -> i64 {
    // FNV-1a: stable across processes and releases, unlike std's hasher.
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in log_key.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    LOCK_NAMESPACE ^ (hash as i64)
}

pub async fn acquire_log_key_lock(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    log_key: &str,
) -> anyhow::Result<()> {
    let key = lock_key_for_log(log_key);
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .persistent(false)
        .bind(key)
        .execute(&mut **tx)
        .await
        .with_context(|| format!("failed to acquire advisory lock (key={key})"))?;
    Ok(())
}
