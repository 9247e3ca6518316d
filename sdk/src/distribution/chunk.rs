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

//! Splitting an upload's validated objects into dispatchable batch units.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// The kind of object a batch unit carries. Certificates and CRLs never mix
/// within one unit.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum BatchObjectType {
    /// Validated certificates.
    Certificate,

    /// Validated CRLs.
    Crl,
}

impl BatchObjectType {
    /// Short tag used inside batch ids.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Certificate => "cert",
            Self::Crl => "crl",
        }
    }
}

impl std::fmt::Display for BatchObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// One dispatchable chunk of an upload's validated objects.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct BatchUnit {
    /// Unique id for this unit, stable for the life of the unit.
    pub batch_id: String,

    /// Upload the objects belong to.
    pub upload_id: String,

    /// Kind of object this unit carries.
    pub object_type: BatchObjectType,

    /// Zero-based position of this unit within its upload and type.
    pub sequence: usize,

    /// Ids of the objects in this unit.
    pub object_ids: Vec<String>,
}

/// Splits `object_ids` into units of at most `chunk_size` objects.
///
/// Order is preserved: unit `n` carries the ids that precede unit `n + 1`'s.
/// The batch id embeds upload, type, and sequence for traceability plus a
/// random suffix so that re-chunking the same upload never reuses an id.
pub fn chunk_objects(
    upload_id: &str,
    object_type: BatchObjectType,
    object_ids: &[String],
    chunk_size: usize,
) -> Vec<BatchUnit> {
    let nonce: u32 = rand::thread_rng().gen();

    object_ids
        .chunks(chunk_size.max(1))
        .enumerate()
        .map(|(sequence, ids)| BatchUnit {
            batch_id: format!("{upload_id}-{}-{sequence}-{nonce:08x}", object_type.tag()),
            upload_id: upload_id.to_string(),
            object_type,
            sequence,
            object_ids: ids.to_vec(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]
    #![allow(clippy::panic)]
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("obj-{i}")).collect()
    }

    #[test]
    fn chunks_preserve_order_and_size() {
        let units = chunk_objects("upload-1", BatchObjectType::Certificate, &ids(7), 3);

        assert_eq!(units.len(), 3);
        assert_eq!(units[0].object_ids.len(), 3);
        assert_eq!(units[2].object_ids, vec!["obj-6".to_string()]);
        assert_eq!(units[1].sequence, 1);

        let all: Vec<&String> = units.iter().flat_map(|u| &u.object_ids).collect();
        assert_eq!(all.len(), 7);
        assert_eq!(all[0], "obj-0");
        assert_eq!(all[6], "obj-6");
    }

    #[test]
    fn empty_input_yields_no_units() {
        assert!(chunk_objects("upload-1", BatchObjectType::Crl, &[], 10).is_empty());
    }

    #[test]
    fn batch_ids_are_unique_across_rechunking() {
        let first = chunk_objects("upload-1", BatchObjectType::Certificate, &ids(2), 1);
        let second = chunk_objects("upload-1", BatchObjectType::Certificate, &ids(2), 1);

        assert_ne!(first[0].batch_id, second[0].batch_id);
        assert!(first[0].batch_id.starts_with("upload-1-cert-0-"));
    }
}
