// Copyright 2025 Adobe. All rights reserved.
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

use p256::ecdsa::signature::Verifier;

use crate::raw_signature::{RawSignatureValidationError, RawSignatureValidator};

/// An `EcdsaValidator` can validate raw signatures with one of the ECDSA
/// signature algorithms.
pub enum EcdsaValidator {
    /// ECDSA with SHA-256 (P-256)
    Es256,

    /// ECDSA with SHA-384 (P-384)
    Es384,
}

impl RawSignatureValidator for EcdsaValidator {
    fn validate(
        &self,
        sig: &[u8],
        data: &[u8],
        public_key: &[u8],
    ) -> Result<(), RawSignatureValidationError> {
        // Certificate signatures arrive DER-encoded; fall back to the fixed
        // size encoding for callers that already converted.
        let result = match self {
            Self::Es256 => {
                use p256::{ecdsa::Signature, ecdsa::VerifyingKey, pkcs8::DecodePublicKey};

                let signature = Signature::from_der(sig)
                    .or_else(|_| Signature::from_slice(sig))
                    .map_err(|_| RawSignatureValidationError::InvalidSignature)?;

                let vk = VerifyingKey::from_public_key_der(public_key)
                    .map_err(|_| RawSignatureValidationError::InvalidPublicKey)?;

                vk.verify(data, &signature)
            }
            Self::Es384 => {
                use p384::{ecdsa::Signature, ecdsa::VerifyingKey, pkcs8::DecodePublicKey};

                let signature = Signature::from_der(sig)
                    .or_else(|_| Signature::from_slice(sig))
                    .map_err(|_| RawSignatureValidationError::InvalidSignature)?;

                let vk = VerifyingKey::from_public_key_der(public_key)
                    .map_err(|_| RawSignatureValidationError::InvalidPublicKey)?;

                vk.verify(data, &signature)
            }
        };

        result.map_err(|_| RawSignatureValidationError::SignatureMismatch)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]
    #![allow(clippy::panic)]
    #![allow(clippy::unwrap_used)]

    use p256::{
        ecdsa::{signature::Signer, Signature, SigningKey},
        pkcs8::EncodePublicKey,
    };
    use rand::rngs::OsRng;

    use super::*;

    #[test]
    fn es256_round_trip() {
        let signing_key = SigningKey::random(&mut OsRng);
        let public_key_der = signing_key
            .verifying_key()
            .to_public_key_der()
            .unwrap()
            .into_vec();

        let data = b"tbs certificate bytes";
        let signature: Signature = signing_key.sign(data);
        let sig_der = signature.to_der();

        let validator = EcdsaValidator::Es256;
        assert!(validator
            .validate(sig_der.as_bytes(), data, &public_key_der)
            .is_ok());

        assert_eq!(
            validator.validate(sig_der.as_bytes(), b"tampered", &public_key_der),
            Err(RawSignatureValidationError::SignatureMismatch)
        );
    }

    #[test]
    fn garbage_signature_is_invalid() {
        let signing_key = SigningKey::random(&mut OsRng);
        let public_key_der = signing_key
            .verifying_key()
            .to_public_key_der()
            .unwrap()
            .into_vec();

        assert_eq!(
            EcdsaValidator::Es256.validate(&[0u8; 7], b"data", &public_key_der),
            Err(RawSignatureValidationError::InvalidSignature)
        );
    }
}
