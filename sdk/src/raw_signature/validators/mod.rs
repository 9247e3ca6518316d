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

//! This module binds Rust native cryptography to this crate's
//! [`RawSignatureValidator`] trait.

use crate::raw_signature::{RawSignatureValidator, SigningAlg};

mod ecdsa_validator;
pub(crate) use ecdsa_validator::EcdsaValidator;

mod ed25519_validator;
pub(crate) use ed25519_validator::Ed25519Validator;

mod rsa_validator;
pub(crate) use rsa_validator::RsaValidator;

/// Return a validator for the given signing algorithm, if one is available.
///
/// Es512 (P-521) signatures are not produced by any PKD participant this
/// crate has encountered; the variant exists for completeness but has no
/// validator.
pub fn validator_for_signing_alg(alg: SigningAlg) -> Option<Box<dyn RawSignatureValidator>> {
    match alg {
        SigningAlg::Ed25519 => Some(Box::new(Ed25519Validator {})),
        SigningAlg::Ps256 => Some(Box::new(RsaValidator::Ps256)),
        SigningAlg::Ps384 => Some(Box::new(RsaValidator::Ps384)),
        SigningAlg::Ps512 => Some(Box::new(RsaValidator::Ps512)),
        SigningAlg::Rsa256 => Some(Box::new(RsaValidator::Rsa256)),
        SigningAlg::Rsa384 => Some(Box::new(RsaValidator::Rsa384)),
        SigningAlg::Rsa512 => Some(Box::new(RsaValidator::Rsa512)),
        SigningAlg::Es256 => Some(Box::new(EcdsaValidator::Es256)),
        SigningAlg::Es384 => Some(Box::new(EcdsaValidator::Es384)),
        _ => None,
    }
}
