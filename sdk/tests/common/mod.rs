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

//! Shared fixtures: a miniature PKI signed with real P-256 keys, plus
//! recording doubles for the directory and progress collaborators.

#![allow(dead_code)]

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use p256::{
    ecdsa::{signature::Signer, Signature, SigningKey, VerifyingKey},
    pkcs8::EncodePublicKey,
};
use pkd::{
    raw_signature::SigningAlg, Certificate, CertificateOrigin, CertificateRevocationList,
    CertificateStatus, CertificateType, DirectoryError, DirectoryStore, DistinguishedName,
    EntryLocation, KeyUsage, MemoryCertificateStore, MemoryCrlStore, ProgressReporter,
    ProgressStage, PublishOutcome,
};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .is_test(true)
        .try_init();
}

/// A certificate plus the private key that can issue children from it.
pub struct TestIdentity {
    pub certificate: Certificate,
    pub signing_key: SigningKey,
}

pub struct CertSpec<'a> {
    pub id: &'a str,
    pub upload_id: &'a str,
    pub certificate_type: CertificateType,
    pub subject: &'a str,
    pub country: &'a str,
    pub serial: Vec<u8>,
}

/// Creates a self-signed certificate (its own issuer).
pub fn self_signed(spec: CertSpec<'_>) -> TestIdentity {
    let signing_key = SigningKey::random(&mut OsRng);
    let certificate = issue(&spec, &signing_key, spec.subject, spec.country, &signing_key);
    TestIdentity {
        certificate,
        signing_key,
    }
}

/// Creates a certificate issued (signed) by `issuer`.
pub fn issued_by(spec: CertSpec<'_>, issuer: &TestIdentity) -> TestIdentity {
    let signing_key = SigningKey::random(&mut OsRng);
    let certificate = issue(
        &spec,
        &signing_key,
        issuer.certificate.subject.as_str(),
        &issuer.certificate.subject_country,
        &issuer.signing_key,
    );
    TestIdentity {
        certificate,
        signing_key,
    }
}

fn issue(
    spec: &CertSpec<'_>,
    own_key: &SigningKey,
    issuer_dn: &str,
    issuer_country: &str,
    issuer_key: &SigningKey,
) -> Certificate {
    let tbs_der = format!("tbs:{}:{}", spec.id, spec.subject).into_bytes();
    let signature: Signature = issuer_key.sign(&tbs_der);

    let public_key_der = VerifyingKey::from(own_key)
        .to_public_key_der()
        .expect("encode public key")
        .into_vec();

    let ca = spec.certificate_type == CertificateType::Csca;

    Certificate {
        id: spec.id.to_string(),
        upload_id: spec.upload_id.to_string(),
        der: tbs_der.clone(),
        tbs_der: tbs_der.clone(),
        signature: signature.to_der().as_bytes().to_vec(),
        signature_alg: SigningAlg::Es256,
        public_key_der,
        serial_number: spec.serial.clone(),
        fingerprint: Sha256::digest(&tbs_der).to_vec(),
        subject: DistinguishedName::new(spec.subject),
        subject_country: spec.country.to_string(),
        issuer: DistinguishedName::new(issuer_dn),
        issuer_country: issuer_country.to_string(),
        not_before: Utc::now() - TimeDelta::days(30),
        not_after: Utc::now() + TimeDelta::days(335),
        certificate_type: spec.certificate_type,
        status: CertificateStatus::Extracted,
        origin: CertificateOrigin::MasterList,
        basic_constraints_ca: ca,
        path_len_constraint: None,
        key_usage: KeyUsage {
            digital_signature: !ca,
            key_cert_sign: ca,
            crl_sign: ca,
        },
    }
}

/// The three-certificate scenario: self-signed CSCA `A`, CA `B` issued by
/// `A`, DSC `C` issued by `B`, all in one upload.
pub struct ChainFixture {
    pub a: TestIdentity,
    pub b: TestIdentity,
    pub c: TestIdentity,
    pub certificate_store: Arc<MemoryCertificateStore>,
    pub crl_store: Arc<MemoryCrlStore>,
}

pub fn chain_fixture(upload_id: &str) -> ChainFixture {
    let a = self_signed(CertSpec {
        id: "cert-a",
        upload_id,
        certificate_type: CertificateType::Csca,
        subject: "CN=CSCA Utopia, C=UT",
        country: "UT",
        serial: vec![0x0a],
    });

    let b = issued_by(
        CertSpec {
            id: "cert-b",
            upload_id,
            certificate_type: CertificateType::Csca,
            subject: "CN=CSCA Utopia Link, C=UT",
            country: "UT",
            serial: vec![0x0b],
        },
        &a,
    );

    let c = issued_by(
        CertSpec {
            id: "cert-c",
            upload_id,
            certificate_type: CertificateType::Dsc,
            subject: "CN=DS 001, C=UT",
            country: "UT",
            serial: vec![0x0c],
        },
        &b,
    );

    let certificate_store = Arc::new(MemoryCertificateStore::new());
    for identity in [&a, &b, &c] {
        certificate_store.insert(identity.certificate.clone());
    }

    ChainFixture {
        a,
        b,
        c,
        certificate_store,
        crl_store: Arc::new(MemoryCrlStore::new()),
    }
}

/// Directory double that records what was published and can simulate
/// rejections or a full outage.
pub struct RecordingDirectory {
    published: Mutex<Vec<(String, String)>>,
    reject_ids: Mutex<HashSet<String>>,
    available: AtomicBool,
}

impl Default for RecordingDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingDirectory {
    pub fn new() -> Self {
        Self {
            published: Mutex::new(vec![]),
            reject_ids: Mutex::new(HashSet::new()),
            available: AtomicBool::new(true),
        }
    }

    pub fn reject(&self, object_id: &str) {
        self.reject_ids
            .lock()
            .unwrap()
            .insert(object_id.to_string());
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// `(object_id, location)` pairs, in publication order.
    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().unwrap().clone()
    }

    fn publish(
        &self,
        object_id: &str,
        location: &EntryLocation,
    ) -> Result<PublishOutcome, DirectoryError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(DirectoryError::Unavailable("directory offline".to_string()));
        }

        if self.reject_ids.lock().unwrap().contains(object_id) {
            return Err(DirectoryError::Rejected(format!(
                "schema violation for {object_id}"
            )));
        }

        let mut published = self.published.lock().unwrap();
        if published.iter().any(|(id, _)| id == object_id) {
            return Ok(PublishOutcome::DuplicateSkipped);
        }

        published.push((object_id.to_string(), location.to_string()));
        Ok(PublishOutcome::Stored)
    }
}

#[async_trait]
impl DirectoryStore for RecordingDirectory {
    async fn publish_certificate(
        &self,
        cert: &Certificate,
        location: &EntryLocation,
    ) -> Result<PublishOutcome, DirectoryError> {
        self.publish(&cert.id, location)
    }

    async fn publish_crl(
        &self,
        crl: &CertificateRevocationList,
        location: &EntryLocation,
    ) -> Result<PublishOutcome, DirectoryError> {
        self.publish(&crl.id, location)
    }
}

/// Progress double that keeps every update it receives.
#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<(String, ProgressStage, u8)>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, ProgressStage, u8)> {
        self.events.lock().unwrap().clone()
    }

    pub fn count_of(&self, stage: ProgressStage) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, s, _)| *s == stage)
            .count()
    }

    pub fn final_percentage(&self) -> Option<u8> {
        self.events.lock().unwrap().last().map(|(_, _, pct)| *pct)
    }
}

impl ProgressReporter for RecordingProgress {
    fn report(
        &self,
        upload_id: &str,
        stage: ProgressStage,
        percentage: u8,
        _message: &str,
        _processed_count: usize,
        _total_count: usize,
    ) {
        self.events
            .lock()
            .unwrap()
            .push((upload_id.to_string(), stage, percentage));
    }
}
