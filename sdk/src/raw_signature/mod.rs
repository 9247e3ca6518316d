// Copyright 2024 Adobe. All rights reserved.
// This file is licensed to you under the Apache License,
// Version 2.0 (http://www.apache.org/licenses/LICENSE-2.0)
// or the MIT license (http://opensource.org/licenses/MIT),
// at your option.

// Unless required by applicable law or agreed to in writing,
// this software is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR REPRESENTATIONS OF ANY KIND, either express or
// implied. See the LICENSE-MIT and LICENSE-APACHE files for the
// specific language governing permissions and limitations under
// each license.

//! Tools for working with raw signature algorithms.
//!
//! This module delegates every cryptographic primitive to RustCrypto
//! implementations; nothing here interprets certificate structure.

mod signing_alg;
pub use signing_alg::{SigningAlg, UnknownAlgorithmError};

mod validators;
pub use validators::validator_for_signing_alg;

use thiserror::Error;

/// Validates `sig` over `data` with the validator for `alg`, if one exists.
pub(crate) fn validate_with_alg(
    alg: SigningAlg,
    sig: &[u8],
    data: &[u8],
    public_key: &[u8],
) -> Result<(), RawSignatureValidationError> {
    match validator_for_signing_alg(alg) {
        Some(validator) => validator.validate(sig, data, public_key),
        None => Err(RawSignatureValidationError::InternalError(format!(
            "no validator available for {alg}"
        ))),
    }
}

/// A `RawSignatureValidator` implementation checks a signature encoded using
/// a specific signature algorithm and a private/public key pair.
///
/// IMPORTANT: The signature this trait checks is the raw signature over a
/// certificate's to-be-signed bytes. The surrounding X.509 structure was
/// already taken apart upstream; `RawSignatureValidator` does not parse it.
pub trait RawSignatureValidator {
    /// Return `Ok(())` if the signature `sig` is valid for the raw content
    /// `data` and the public key `public_key` (SubjectPublicKeyInfo, DER).
    fn validate(
        &self,
        sig: &[u8],
        data: &[u8],
        public_key: &[u8],
    ) -> Result<(), RawSignatureValidationError>;
}

/// Describes errors that can be identified when validating a raw signature.
#[derive(Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum RawSignatureValidationError {
    /// The signature does not match the provided data or public key.
    #[error("signature does not match the provided data or public key")]
    SignatureMismatch,

    /// The signature bytes could not be interpreted for this algorithm.
    #[error("the signature is malformed for this algorithm")]
    InvalidSignature,

    /// The public key could not be interpreted for this algorithm.
    #[error("the public key is malformed for this algorithm")]
    InvalidPublicKey,

    /// An error was reported by the underlying cryptography implementation.
    #[error("an error was reported by the cryptography library: {0}")]
    CryptoLibraryError(String),

    /// An unexpected internal error occurred.
    #[error("internal error ({0})")]
    InternalError(String),
}
