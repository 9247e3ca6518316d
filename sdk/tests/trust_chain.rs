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

//! Chain-building behavior against a miniature PKI with real P-256
//! signatures.

#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]

mod common;

use std::sync::Arc;

use common::{chain_fixture, init_logging, RecordingDirectory, RecordingProgress};
use pkd::{
    revocation::RevocationStatus,
    trust_chain::{ChainOutcome, TrustChainBuilder},
    Error, PkdEngine, TrustChainResponse,
};
use pkd_status_tracker::{validation_codes, LogKind, StatusTracker};

fn engine(fixture: &common::ChainFixture) -> PkdEngine {
    PkdEngine::new(
        fixture.certificate_store.clone(),
        fixture.crl_store.clone(),
        Arc::new(RecordingDirectory::new()),
        Arc::new(RecordingProgress::new()),
    )
}

#[test]
fn self_signed_certificate_is_a_single_link_anchor() {
    init_logging();
    let fixture = chain_fixture("upload-1");

    let builder = TrustChainBuilder::new(fixture.certificate_store.clone(), 8).unwrap();
    let mut log = StatusTracker::default();
    let report = builder.build_chain("cert-a", None, &mut log).unwrap();

    assert!(report.chain_valid);
    assert_eq!(report.chain_depth, 1);
    assert_eq!(report.outcome, ChainOutcome::Complete);

    let anchor = report.trust_anchor.unwrap();
    assert_eq!(anchor.certificate_id, "cert-a");
    assert_eq!(anchor.country, "UT");
    assert!(log.has_status(validation_codes::TRUST_CHAIN_COMPLETE));
}

#[test]
fn three_link_chain_resolves_to_the_root_anchor() {
    init_logging();
    let fixture = chain_fixture("upload-1");

    let builder = TrustChainBuilder::new(fixture.certificate_store.clone(), 8).unwrap();
    let mut log = StatusTracker::default();
    let report = builder.build_chain("cert-c", None, &mut log).unwrap();

    assert!(report.chain_valid);
    assert_eq!(report.chain_depth, 3);

    let ids: Vec<&str> = report
        .links
        .iter()
        .map(|link| link.certificate_id.as_str())
        .collect();
    assert_eq!(ids, vec!["cert-c", "cert-b", "cert-a"]);
    assert!(report
        .links
        .iter()
        .all(|link| link.signature_valid == Some(true)));
    assert_eq!(report.trust_anchor.unwrap().certificate_id, "cert-a");
}

#[test]
fn missing_intermediate_reports_exactly_one_issuer_not_found() {
    init_logging();
    let fixture = chain_fixture("upload-1");

    // Rebuild the store without the intermediate.
    let store = Arc::new(pkd::MemoryCertificateStore::new());
    store.insert(fixture.a.certificate.clone());
    store.insert(fixture.c.certificate.clone());

    let builder = TrustChainBuilder::new(store, 8).unwrap();
    let mut log = StatusTracker::default();
    let report = builder.build_chain("cert-c", None, &mut log).unwrap();

    assert!(!report.chain_valid);
    assert!(matches!(
        &report.outcome,
        ChainOutcome::IssuerNotFound { missing_issuer }
            if missing_issuer.as_str() == fixture.b.certificate.subject.as_str()
    ));

    let issuer_not_found: Vec<_> = log
        .logged_items()
        .iter()
        .filter(|item| {
            item.kind == LogKind::Failure
                && item.validation_status.as_deref() == Some(validation_codes::ISSUER_NOT_FOUND)
        })
        .collect();
    assert_eq!(issuer_not_found.len(), 1);
    assert!(issuer_not_found[0]
        .description
        .contains(fixture.b.certificate.subject.as_str()));

    // The walk ended on a certificate that is not self-signed; that is
    // worth a note but not a second failure.
    assert!(log.has_status(validation_codes::TRUST_ANCHOR_NOT_SELF_SIGNED));
}

#[test]
fn depth_bound_stops_the_walk() {
    init_logging();
    let fixture = chain_fixture("upload-1");

    let builder = TrustChainBuilder::new(fixture.certificate_store.clone(), 2).unwrap();
    let mut log = StatusTracker::default();
    let report = builder.build_chain("cert-c", None, &mut log).unwrap();

    assert!(!report.chain_valid);
    assert_eq!(report.outcome, ChainOutcome::MaxDepthExceeded);
    assert_eq!(report.chain_depth, 2);
    assert!(report.trust_anchor.is_none());
    assert!(log.has_status(validation_codes::MAX_DEPTH_EXCEEDED));
}

#[test]
fn chain_filling_the_depth_bound_exactly_is_valid() {
    init_logging();
    let fixture = chain_fixture("upload-1");

    // Three links under a bound of three: the self-signed terminal is the
    // last permitted link, not one past it.
    let builder = TrustChainBuilder::new(fixture.certificate_store.clone(), 3).unwrap();
    let mut log = StatusTracker::default();
    let report = builder.build_chain("cert-c", None, &mut log).unwrap();

    assert!(report.chain_valid);
    assert_eq!(report.chain_depth, 3);
    assert_eq!(report.outcome, ChainOutcome::Complete);
    assert!(!log.has_status(validation_codes::MAX_DEPTH_EXCEEDED));
}

#[test]
fn out_of_range_depth_is_rejected() {
    let fixture = chain_fixture("upload-1");

    assert!(matches!(
        TrustChainBuilder::new(fixture.certificate_store.clone(), 0),
        Err(Error::BadParam(_))
    ));
    assert!(matches!(
        TrustChainBuilder::new(fixture.certificate_store.clone(), 17),
        Err(Error::BadParam(_))
    ));
}

#[test]
fn tampered_link_signature_invalidates_the_chain() {
    init_logging();
    let fixture = chain_fixture("upload-1");

    let mut tampered = fixture.c.certificate.clone();
    tampered.tbs_der = b"tbs:cert-c:altered".to_vec();
    fixture.certificate_store.insert(tampered);

    let builder = TrustChainBuilder::new(fixture.certificate_store.clone(), 8).unwrap();
    let mut log = StatusTracker::default();
    let report = builder.build_chain("cert-c", None, &mut log).unwrap();

    // Structurally complete, cryptographically broken.
    assert_eq!(report.chain_depth, 3);
    assert!(!report.chain_valid);
    assert!(log.has_status(validation_codes::SIGNATURE_INVALID));
    assert_eq!(report.links[0].signature_valid, Some(false));
    assert_eq!(report.links[1].signature_valid, Some(true));
}

#[tokio::test]
async fn anchor_country_mismatch_is_its_own_response() {
    init_logging();
    let fixture = chain_fixture("upload-1");
    let engine = engine(&fixture);

    let mut log = StatusTracker::default();
    let response = engine
        .verify_trust_chain("cert-c", Some("DE"), false, None, &mut log)
        .await
        .unwrap();

    match response {
        TrustChainResponse::AnchorCountryMismatch {
            required, found, ..
        } => {
            assert_eq!(required, "DE");
            assert_eq!(found, "UT");
        }
        other => panic!("expected AnchorCountryMismatch, got {other:?}"),
    }
    assert!(log.has_status(validation_codes::TRUST_ANCHOR_NOT_FOUND));
}

#[tokio::test]
async fn unreachable_crl_is_reported_distinct_from_revoked() {
    init_logging();
    let fixture = chain_fixture("upload-1");
    let engine = engine(&fixture);

    // No CRL in the store at all.
    let mut log = StatusTracker::default();
    let response = engine
        .verify_trust_chain("cert-c", None, true, None, &mut log)
        .await
        .unwrap();

    match response {
        TrustChainResponse::Complete { revocation, .. } => {
            assert_eq!(revocation, Some(RevocationStatus::CrlUnavailable));
        }
        other => panic!("expected Complete, got {other:?}"),
    }

    assert!(log.has_status(validation_codes::CRL_UNAVAILABLE));
    assert!(!log.has_status(validation_codes::CERTIFICATE_REVOKED));
}

#[test]
fn unknown_certificate_is_an_error() {
    let fixture = chain_fixture("upload-1");

    let builder = TrustChainBuilder::new(fixture.certificate_store.clone(), 8).unwrap();
    let mut log = StatusTracker::default();

    assert!(matches!(
        builder.build_chain("cert-zz", None, &mut log),
        Err(Error::CertificateMissing { .. })
    ));
    assert!(log.has_status(validation_codes::EMPTY_CHAIN));
}
