// src/crypto/provider.rs
//! Process-wide cipher registration
//!
//! Runs a single self-test round trip the first time any component needs
//! the cipher. Later calls (and racing first calls) observe the cached
//! outcome.

use once_cell::sync::OnceCell;
use tracing::{error, info};

use super::decrypt::decrypt;
use super::encrypt::encrypt;
use crate::error::{CoreError, Result};

pub const ALGORITHM_NAME: &str = "AESCryptV3-PBKDF2-SHA512-AES256-CBC";

static PROVIDER: OnceCell<std::result::Result<(), String>> = OnceCell::new();

pub fn register_provider() -> Result<()> {
    PROVIDER
        .get_or_init(|| {
            let outcome = self_test();
            match &outcome {
                Ok(()) => info!(algorithm = ALGORITHM_NAME, "cipher provider registered"),
                Err(e) => error!(algorithm = ALGORITHM_NAME, error = %e, "cipher self-test failed"),
            }
            outcome
        })
        .clone()
        .map_err(CoreError::Configuration)
}

pub fn is_registered() -> bool {
    matches!(PROVIDER.get(), Some(Ok(())))
}

fn self_test() -> std::result::Result<(), String> {
    const PROBE: &str = "efv-provider-probe";
    const PASSWORD: &str = "efv-provider-self-test";

    let ciphertext = encrypt(PROBE, PASSWORD).map_err(|e| e.to_string())?;
    let roundtrip = decrypt(&ciphertext, PASSWORD).map_err(|e| e.to_string())?;
    if roundtrip != PROBE {
        return Err("round trip returned different plaintext".into());
    }
    Ok(())
}
