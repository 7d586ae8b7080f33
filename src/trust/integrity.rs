use sha2::{Digest, Sha256, Sha512};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use crate::errors::AutopatchError;
use crate::models::PackageSpecification;
use tracing::{debug, error};

const CHUNK_SIZE: usize = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Sha256,
    Sha512,
}

impl DigestAlgorithm {
    fn hex_len(&self) -> usize {
        match self {
            Self::Sha256 => 64,
            Self::Sha512 => 128,
        }
    }
}

/// Split a declared checksum into algorithm and lowercase hex.
/// A value without a prefix is taken as SHA-256.
pub fn parse_declared_digest(declared: &str) -> Result<(DigestAlgorithm, String), AutopatchError> {
    let declared = declared.trim();
    let (algorithm, hex_part) = match declared.split_once(':') {
        Some((algo, hex_part)) => {
            let algorithm = match algo.trim().to_ascii_lowercase().as_str() {
                "sha256" => DigestAlgorithm::Sha256,
                "sha512" => DigestAlgorithm::Sha512,
                other => return Err(AutopatchError::UnsupportedDigest(other.to_string())),
            };
            (algorithm, hex_part.trim())
        }
        None => (DigestAlgorithm::Sha256, declared),
    };

    let hex_part = hex_part.to_ascii_lowercase();
    if hex_part.len() != algorithm.hex_len() || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AutopatchError::UnsupportedDigest(format!(
            "malformed {:?} value '{}'",
            algorithm, hex_part
        )));
    }
    Ok((algorithm, hex_part))
}

fn stream_digest<D: Digest>(mut reader: impl Read) -> std::io::Result<String> {
    let mut hasher = D::new();
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Hex digest of a file, read in fixed-size chunks.
pub fn file_digest(path: &Path, algorithm: DigestAlgorithm) -> Result<String, AutopatchError> {
    let file = File::open(path)?;
    let digest = match algorithm {
        DigestAlgorithm::Sha256 => stream_digest::<Sha256>(file)?,
        DigestAlgorithm::Sha512 => stream_digest::<Sha512>(file)?,
    };
    Ok(digest)
}

/// Check an artifact against its declared checksum.
pub fn verify_artifact(artifact: &Path, declared: &str) -> Result<(), AutopatchError> {
    let (algorithm, expected) = parse_declared_digest(declared)?;
    let actual = file_digest(artifact, algorithm).map_err(|e| match e {
        // A missing artifact cannot match any declared digest
        AutopatchError::Io(io) => AutopatchError::IntegrityMismatch {
            artifact: artifact.to_path_buf(),
            expected: expected.clone(),
            actual: format!("<unreadable: {}>", io),
        },
        other => other,
    })?;

    if actual != expected {
        error!(
            artifact = %artifact.display(),
            expected = %expected,
            actual = %actual,
            "Artifact checksum mismatch"
        );
        return Err(AutopatchError::IntegrityMismatch {
            artifact: artifact.to_path_buf(),
            expected,
            actual,
        });
    }

    debug!(artifact = %artifact.display(), digest = %actual, "Artifact checksum verified");
    Ok(())
}

/// Verify the artifact a specification points at.
pub fn verify_specification(spec: &PackageSpecification) -> Result<(), AutopatchError> {
    verify_artifact(&spec.artifact_path, &spec.expected_digest)
}
