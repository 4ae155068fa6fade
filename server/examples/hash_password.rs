//! Print an Argon2id hash for seeding a user row by hand.
//!
//! Usage: `cargo run --example hash_password -- <password>`

use learnhub_server::users::{hash_password, PASSWORD_MIN_LEN};

fn main() -> anyhow::Result<()> {
    let password = std::env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("Usage: hash_password <password>"))?;
    if (password.chars().count() as u64) < PASSWORD_MIN_LEN {
        anyhow::bail!("password must be at least {PASSWORD_MIN_LEN} characters");
    }

    println!("{}", hash_password(&password)?);
    Ok(())
}
