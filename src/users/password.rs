use anyhow::Context;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use tracing::error;

lazy_static! {
    // Verified against when the email is unknown so both login failures cost the same.
    static ref DUMMY_HASH: String =
        hash_password("marquee-timing-equalizer").unwrap_or_default();
}

fn argon2_error(stage: &'static str) -> impl FnOnce(argon2::password_hash::Error) -> anyhow::Error {
    move |e| {
        error!(error = %e, stage, "argon2 failure");
        anyhow::anyhow!("argon2 {stage}: {e}")
    }
}

/// PHC-encoded argon2id hash of `plain` with a fresh salt.
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let phc = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(argon2_error("hash"))?;
    Ok(phc.to_string())
}

/// `Ok(false)` on mismatch; `Err` only when `phc` is not a parsable hash.
pub fn verify_password(plain: &str, phc: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(phc).map_err(argon2_error("parse"))?;
    let matched = Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok();
    Ok(matched)
}

/// Hash on the blocking pool; argon2 is deliberately slow.
pub async fn hash_password_async(plain: String) -> anyhow::Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&plain))
        .await
        .context("join hash_password task")?
}

pub async fn verify_password_async(plain: String, hash: String) -> anyhow::Result<bool> {
    tokio::task::spawn_blocking(move || verify_password(&plain, &hash))
        .await
        .context("join verify_password task")?
}

/// Burn one verification for an email with no account. Result is ignored.
pub async fn verify_dummy(plain: String) {
    let _ = verify_password_async(plain, DUMMY_HASH.clone()).await;
}
