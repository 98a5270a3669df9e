// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the sensor-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Frame signature checking
//!
//! Sensors sign the 22 byte payload with RSA PKCS#1 v1.5 over a SHA-256
//! digest. The bridge holds one public key, loaded once at startup and never
//! rotated.
//!
//! Keys are accepted in both PEM flavours produced by common tooling:
//! SubjectPublicKeyInfo (`BEGIN PUBLIC KEY`, what `openssl pkey -pubout`
//! writes) and PKCS#1 (`BEGIN RSA PUBLIC KEY`).

use std::fs;
use std::path::Path;

use log::debug;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::sha2::Sha256;
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};

use super::codec::{encode, SensorReading, PAYLOAD_LEN};
use crate::error::{BridgeError, BridgeResult};

/// Verifies frame signatures against a single, immutable RSA public key
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    verifying_key: VerifyingKey<Sha256>,
    signature_len: usize,
}

impl SignatureVerifier {
    /// Load the verification key from a PEM file
    ///
    /// ### Errors
    ///
    /// `BridgeError::Startup` if the file cannot be read or does not hold an
    /// RSA public key.
    pub fn from_pem_file<P: AsRef<Path>>(path: P) -> BridgeResult<Self> {
        let path = path.as_ref();
        let pem = fs::read_to_string(path).map_err(|e| {
            BridgeError::Startup(format!("cannot read public key {}: {}", path.display(), e))
        })?;
        let verifier = Self::from_pem(&pem).map_err(|e| match e {
            BridgeError::Startup(msg) => {
                BridgeError::Startup(format!("{} ({})", msg, path.display()))
            }
            other => other,
        })?;
        debug!(
            "Loaded {} bit verification key from {}",
            verifier.signature_len * 8,
            path.display()
        );
        Ok(verifier)
    }

    /// Parse a PEM encoded RSA public key
    pub fn from_pem(pem: &str) -> BridgeResult<Self> {
        let public_key = RsaPublicKey::from_public_key_pem(pem)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
            .map_err(|e| BridgeError::Startup(format!("invalid RSA public key: {}", e)))?;
        Ok(Self::new(public_key))
    }

    pub fn new(public_key: RsaPublicKey) -> Self {
        let signature_len = public_key.size();
        Self {
            verifying_key: VerifyingKey::new(public_key),
            signature_len,
        }
    }

    /// Signature length implied by the key modulus (256 for RSA-2048)
    pub fn signature_len(&self) -> usize {
        self.signature_len
    }

    /// Full frame length on the wire: payload followed by signature
    pub fn frame_len(&self) -> usize {
        PAYLOAD_LEN + self.signature_len
    }

    /// Check `signature` over exactly `payload`
    ///
    /// ### Errors
    ///
    /// `BridgeError::Signature` when the signature is malformed or does not
    /// match.
    pub fn verify(&self, payload: &[u8], signature: &[u8]) -> BridgeResult<()> {
        if payload.len() != PAYLOAD_LEN {
            return Err(BridgeError::Signature(format!(
                "payload must be {} bytes, got {}",
                PAYLOAD_LEN,
                payload.len()
            )));
        }
        if signature.len() != self.signature_len {
            return Err(BridgeError::Signature(format!(
                "signature must be {} bytes, got {}",
                self.signature_len,
                signature.len()
            )));
        }

        let signature =
            Signature::try_from(signature).map_err(|e| BridgeError::Signature(e.to_string()))?;
        self.verifying_key
            .verify(payload, &signature)
            .map_err(|e| BridgeError::Signature(e.to_string()))
    }
}

/// Signs payloads the way a field sensor does
///
/// Used by the `sensor_client` simulator and by tests; the bridge itself never
/// holds a private key.
#[derive(Debug, Clone)]
pub struct FrameSigner {
    signing_key: SigningKey<Sha256>,
}

impl FrameSigner {
    /// Parse a PEM encoded RSA private key (PKCS#8 or PKCS#1)
    pub fn from_pem(pem: &str) -> BridgeResult<Self> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|e| BridgeError::Startup(format!("invalid RSA private key: {}", e)))?;
        Ok(Self::new(private_key))
    }

    pub fn from_pem_file<P: AsRef<Path>>(path: P) -> BridgeResult<Self> {
        let path = path.as_ref();
        let pem = fs::read_to_string(path).map_err(|e| {
            BridgeError::Startup(format!("cannot read private key {}: {}", path.display(), e))
        })?;
        Self::from_pem(&pem)
    }

    pub fn new(private_key: RsaPrivateKey) -> Self {
        Self {
            signing_key: SigningKey::new(private_key),
        }
    }

    pub fn sign(&self, payload: &[u8]) -> Vec<u8> {
        self.signing_key.sign(payload).to_vec()
    }

    /// Encode and sign a reading, returning payload and signature concatenated
    pub fn build_frame(&self, reading: &SensorReading) -> Vec<u8> {
        let payload = encode(reading);
        let mut frame = payload.to_vec();
        frame.extend_from_slice(&self.sign(&payload));
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PUBLIC_PEM: &str = include_str!("../../tests/fixtures/public.pem");
    const PUBLIC_PKCS1_PEM: &str = include_str!("../../tests/fixtures/public_pkcs1.pem");
    const OTHER_PUBLIC_PEM: &str = include_str!("../../tests/fixtures/other_public.pem");
    const SCENARIO_FRAME: &[u8] = include_bytes!("../../tests/fixtures/scenario_frame.bin");

    #[test]
    fn test_accepts_presigned_scenario_frame() {
        let verifier = SignatureVerifier::from_pem(PUBLIC_PEM).unwrap();
        assert_eq!(verifier.signature_len(), 256);
        assert_eq!(verifier.frame_len(), SCENARIO_FRAME.len());

        let (payload, signature) = SCENARIO_FRAME.split_at(PAYLOAD_LEN);
        verifier.verify(payload, signature).unwrap();
    }

    #[test]
    fn test_accepts_pkcs1_public_key() {
        let verifier = SignatureVerifier::from_pem(PUBLIC_PKCS1_PEM).unwrap();
        let (payload, signature) = SCENARIO_FRAME.split_at(PAYLOAD_LEN);
        assert!(verifier.verify(payload, signature).is_ok());
    }

    #[test]
    fn test_single_bit_flip_is_rejected() {
        let verifier = SignatureVerifier::from_pem(PUBLIC_PEM).unwrap();

        // Every bit of the payload, and a spread of signature bits
        let payload_bits = (0..PAYLOAD_LEN * 8).collect::<Vec<_>>();
        let signature_bits = (PAYLOAD_LEN * 8..SCENARIO_FRAME.len() * 8).step_by(61);

        for bit in payload_bits.into_iter().chain(signature_bits) {
            let mut frame = SCENARIO_FRAME.to_vec();
            frame[bit / 8] ^= 1 << (bit % 8);
            let (payload, signature) = frame.split_at(PAYLOAD_LEN);
            assert!(
                matches!(
                    verifier.verify(payload, signature),
                    Err(BridgeError::Signature(_))
                ),
                "flipping bit {} was not detected",
                bit
            );
        }
    }

    #[test]
    fn test_wrong_key_is_rejected() {
        let verifier = SignatureVerifier::from_pem(OTHER_PUBLIC_PEM).unwrap();
        let (payload, signature) = SCENARIO_FRAME.split_at(PAYLOAD_LEN);
        assert!(verifier.verify(payload, signature).is_err());
    }

    #[test]
    fn test_truncated_signature_is_rejected() {
        let verifier = SignatureVerifier::from_pem(PUBLIC_PEM).unwrap();
        let (payload, signature) = SCENARIO_FRAME.split_at(PAYLOAD_LEN);
        assert!(matches!(
            verifier.verify(payload, &signature[..200]),
            Err(BridgeError::Signature(_))
        ));
    }

    #[test]
    fn test_garbage_pem_is_startup_error() {
        let err = SignatureVerifier::from_pem("-----BEGIN PUBLIC KEY-----\nnope\n").unwrap_err();
        assert!(matches!(err, BridgeError::Startup(_)));
    }

    #[test]
    fn test_missing_key_file_is_startup_error() {
        let err = SignatureVerifier::from_pem_file("/nonexistent/public.pem").unwrap_err();
        assert_eq!(err.kind(), "StartupError");
    }

    #[test]
    fn test_signer_round_trip() {
        let signer =
            FrameSigner::from_pem(include_str!("../../tests/fixtures/private.pem")).unwrap();
        let verifier = SignatureVerifier::from_pem(PUBLIC_PEM).unwrap();
        let reading = SensorReading {
            sensor_id: 7,
            timestamp: 1_650_000_000,
            temperature: 21.0,
            pressure: 1011.5,
            humidity: 48.25,
        };

        let frame = signer.build_frame(&reading);
        assert_eq!(frame.len(), verifier.frame_len());
        let (payload, signature) = frame.split_at(PAYLOAD_LEN);
        verifier.verify(payload, signature).unwrap();
    }
}
