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

use rsa::{pkcs8::DecodePublicKey, pss::Pss, Pkcs1v15Sign, RsaPublicKey};
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::raw_signature::{RawSignatureValidationError, RawSignatureValidator};

/// An `RsaValidator` can validate raw signatures with one of the RSA
/// signature algorithms (RSASSA-PSS or the PKCS#1 v1.5 scheme still common
/// on older CSCA certificates).
pub enum RsaValidator {
    /// RSASSA-PSS with SHA-256
    Ps256,

    /// RSASSA-PSS with SHA-384
    Ps384,

    /// RSASSA-PSS with SHA-512
    Ps512,

    /// RSASSA-PKCS1 v1.5 with SHA-256
    Rsa256,

    /// RSASSA-PKCS1 v1.5 with SHA-384
    Rsa384,

    /// RSASSA-PKCS1 v1.5 with SHA-512
    Rsa512,
}

impl RawSignatureValidator for RsaValidator {
    fn validate(
        &self,
        sig: &[u8],
        data: &[u8],
        public_key: &[u8],
    ) -> Result<(), RawSignatureValidationError> {
        let vk = RsaPublicKey::from_public_key_der(public_key)
            .map_err(|_| RawSignatureValidationError::InvalidPublicKey)?;

        let result = match self {
            Self::Ps256 => vk.verify(Pss::new::<Sha256>(), &Sha256::digest(data), sig),
            Self::Ps384 => vk.verify(Pss::new::<Sha384>(), &Sha384::digest(data), sig),
            Self::Ps512 => vk.verify(Pss::new::<Sha512>(), &Sha512::digest(data), sig),
            Self::Rsa256 => vk.verify(Pkcs1v15Sign::new::<Sha256>(), &Sha256::digest(data), sig),
            Self::Rsa384 => vk.verify(Pkcs1v15Sign::new::<Sha384>(), &Sha384::digest(data), sig),
            Self::Rsa512 => vk.verify(Pkcs1v15Sign::new::<Sha512>(), &Sha512::digest(data), sig),
        };

        result.map_err(|_| RawSignatureValidationError::SignatureMismatch)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]
    #![allow(clippy::panic)]
    #![allow(clippy::unwrap_used)]

    use rand::rngs::OsRng;
    use rsa::{
        pkcs1v15::SigningKey,
        pkcs8::EncodePublicKey,
        signature::{SignatureEncoding, Signer},
        RsaPrivateKey,
    };
    use sha2::Sha256;

    use super::*;

    #[test]
    fn pkcs1v15_round_trip() {
        let private_key = RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
        let public_key_der = private_key
            .to_public_key()
            .to_public_key_der()
            .unwrap()
            .into_vec();

        let signing_key = SigningKey::<Sha256>::new(private_key);
        let data = b"tbs certificate bytes";
        let sig = signing_key.sign(data).to_vec();

        let validator = RsaValidator::Rsa256;
        assert!(validator.validate(&sig, data, &public_key_der).is_ok());

        assert_eq!(
            validator.validate(&sig, b"tampered", &public_key_der),
            Err(RawSignatureValidationError::SignatureMismatch)
        );
    }
}
