// ABOUTME: Key generation tool for the SSO server signing key pair
// ABOUTME: Writes an RSA private key (PKCS#8) and public key (SPKI) as PEM files
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use anyhow::{bail, Context, Result};
use clap::Parser;
use sso_server::constants::service::DEFAULT_KEY_ID;
use sso_server::jwks::{SigningKeyPair, MIN_RSA_KEY_BITS};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "sso-keygen")]
#[command(about = "Generate the RSA key pair used to sign SSO tokens")]
struct Args {
    /// Directory to write private_key.pem and public_key.pem into
    #[arg(long, default_value = "keys")]
    out_dir: PathBuf,

    /// RSA modulus size in bits
    #[arg(long, default_value_t = 2048)]
    bits: usize,

    /// Overwrite existing key files
    #[arg(long)]
    force: bool,
}

fn write_key(path: &Path, pem: &str, private: bool) -> Result<()> {
    fs::write(path, pem).with_context(|| format!("Cannot write {}", path.display()))?;

    #[cfg(unix)]
    if private {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Cannot restrict permissions on {}", path.display()))?;
    }
    #[cfg(not(unix))]
    let _ = private;

    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.bits < MIN_RSA_KEY_BITS {
        bail!("RSA keys must be at least {MIN_RSA_KEY_BITS} bits");
    }

    let private_path = args.out_dir.join("private_key.pem");
    let public_path = args.out_dir.join("public_key.pem");
    if !args.force && (private_path.exists() || public_path.exists()) {
        bail!(
            "Key files already exist in {}; pass --force to replace them",
            args.out_dir.display()
        );
    }

    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("Cannot create {}", args.out_dir.display()))?;

    let key_pair = SigningKeyPair::generate_with_key_size(DEFAULT_KEY_ID, args.bits)?;
    write_key(&private_path, &key_pair.export_private_key_pem()?, true)?;
    write_key(&public_path, &key_pair.export_public_key_pem()?, false)?;

    println!("Wrote {}", private_path.display());
    println!("Wrote {}", public_path.display());
    Ok(())
}
