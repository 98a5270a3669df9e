// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the sensor-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Frame authentication settings

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where the sensor verification key lives.
///
/// The key is read once at startup; the bridge refuses to start if it is
/// missing or is not an RSA public key in PEM form. Generate a pair with the
/// included `keygen` binary or with `openssl genpkey`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default = "default_public_key")]
    pub public_key: PathBuf,
}

fn default_public_key() -> PathBuf {
    PathBuf::from("public.pem")
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            public_key: default_public_key(),
        }
    }
}
