// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the sensor-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};

/// Generate the RSA key pair used to sign and verify sensor frames
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Output path for the public key PEM file, deployed on the bridge
    #[clap(long, default_value = "./public.pem")]
    out_pub_key: PathBuf,

    /// Output path for the private key PEM file, deployed on the sensors
    #[clap(long, default_value = "./private.pem")]
    out_private_key: PathBuf,

    /// RSA key length in bits
    #[clap(long, default_value = "2048")]
    length: usize,
}

fn write_pem(path: &Path, pem: &str, what: &str) -> Result<()> {
    let mut file = File::create(path)
        .with_context(|| format!("Failed to create {} file at {:?}", what, path))?;
    file.write_all(pem.as_bytes())
        .with_context(|| format!("Failed to write {} to {:?}", what, path))?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    println!("Generating RSA key pair with {} bits...", args.length);

    let mut rng = rsa::rand_core::OsRng;

    let private_key =
        RsaPrivateKey::new(&mut rng, args.length).context("Failed to generate RSA private key")?;
    let public_key = RsaPublicKey::from(&private_key);

    // PKCS#8 private key and SubjectPublicKeyInfo public key, the same
    // encodings `openssl genpkey` and `openssl pkey -pubout` produce
    let private_pem = private_key
        .to_pkcs8_pem(LineEnding::LF)
        .context("Failed to encode private key to PEM")?;
    let public_pem = public_key
        .to_public_key_pem(LineEnding::LF)
        .context("Failed to encode public key to PEM")?;

    write_pem(&args.out_private_key, &private_pem, "private key")?;
    write_pem(&args.out_pub_key, &public_pem, "public key")?;

    println!("Private key written to: {:?}", args.out_private_key);
    println!("Public key written to: {:?}", args.out_pub_key);
    println!();
    if args.length != 2048 {
        println!(
            "Frames signed with a {} bit key carry {} byte signatures.",
            args.length,
            args.length / 8
        );
    }
    println!("Point security.public_key in config.yaml at the public key.");

    Ok(())
}
