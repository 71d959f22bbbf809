use sigstore_bundle_verifier::{parse_bundle_from_path, Verifier, VerifierConfig};
use std::env;
use std::path::PathBuf;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 3 {
        eprintln!(
            "Usage: {} <trusted-root.jsonl> <path-to-sigstore-bundle.json> [artifact-path]",
            args[0]
        );
        std::process::exit(1);
    }

    let trusted_root_path = PathBuf::from(&args[1]);
    let bundle_path = PathBuf::from(&args[2]);
    let artifact_path = args.get(3).map(PathBuf::from);

    let jsonl = std::fs::read_to_string(&trusted_root_path).unwrap_or_else(|e| {
        eprintln!("failed to read trusted root {}: {e}", trusted_root_path.display());
        std::process::exit(1);
    });
    let verifier = Verifier::from_jsonl(&jsonl).unwrap_or_else(|e| {
        eprintln!("failed to load trusted root: {e}");
        std::process::exit(1);
    });

    let bundle = parse_bundle_from_path(&bundle_path).unwrap_or_else(|e| {
        eprintln!("failed to parse bundle: {e}");
        std::process::exit(1);
    });

    let artifact = artifact_path.map(|p| {
        std::fs::read(&p).unwrap_or_else(|e| {
            eprintln!("failed to read artifact {}: {e}", p.display());
            std::process::exit(1);
        })
    });

    println!("Verifying bundle: {}", bundle_path.display());
    println!();

    match verifier.verify(&bundle, artifact.as_deref(), &VerifierConfig::default()) {
        Ok(result) => {
            println!("Verification SUCCESS\n");

            if let Some(hashes) = &result.certificate_hashes {
                println!("Certificate Chain Hashes:");
                println!("  Leaf:   {}", hex::encode(hashes.leaf));
                for (i, hash) in hashes.intermediates.iter().enumerate() {
                    println!("  Int[{i}]: {}", hex::encode(hash));
                }
                println!("  Root:   {}", hex::encode(hashes.root));
                println!();
            }

            println!("Check time: {}", result.check_time.to_rfc3339());
            for ts in &result.verified_timestamps {
                match &ts.source {
                    sigstore_bundle_verifier::types::TimestampSource::TransparencyLog { log_id } => {
                        println!("  transparency log {log_id}: {}", ts.time.to_rfc3339());
                    }
                    sigstore_bundle_verifier::types::TimestampSource::Rfc3161 => {
                        println!("  RFC3161 timestamp: {}", ts.time.to_rfc3339());
                    }
                }
            }

            if let Some(identity) = &result.signer_identity {
                println!("\nSigner Identity:");
                if let Some(issuer) = &identity.oidc_issuer {
                    println!("  OIDC Issuer: {issuer}");
                }
                if let Some(subject) = identity.subject() {
                    println!("  Subject: {subject}");
                }
            }
        }
        Err(e) => {
            eprintln!("Verification FAILED");
            eprintln!("\nError: {e}");
            std::process::exit(1);
        }
    }
}
