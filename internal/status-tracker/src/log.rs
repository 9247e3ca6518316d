// Copyright 2022 Adobe. All rights reserved.
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

use std::{borrow::Cow, fmt::Debug};

use crate::StatusTracker;

/// Detailed information about an error or other noteworthy condition found
/// while validating or distributing ePassport PKI objects.
///
/// Use the [`log_item`](crate::log_item) macro to create a `LogItem`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LogItem {
    /// Kind of log item.
    pub kind: LogKind,

    /// Label of the object this item references (typically a certificate or
    /// CRL id), or other descriptive label.
    pub label: Cow<'static, str>,

    /// Description of the condition.
    pub description: Cow<'static, str>,

    /// Source file where the condition was detected.
    pub file: Cow<'static, str>,

    /// Function where the condition was detected.
    pub function: Cow<'static, str>,

    /// Source line number where the condition was detected.
    pub line: u32,

    /// Error value as a string, if any.
    pub err_val: Option<Cow<'static, str>>,

    /// Validation status code (see [`validation_codes`]).
    ///
    /// [`validation_codes`]: crate::validation_codes
    pub validation_status: Option<Cow<'static, str>>,

    /// Id of the object that was current in the [`StatusTracker`] when this
    /// item was logged, if any.
    pub object_id: Option<Cow<'static, str>>,
}

impl LogItem {
    /// Captures the description from the value (typically an `Error` enum) as
    /// additional information for this `LogItem`.
    ///
    /// This is implemented using the [`Debug`] trait, which the `Error` enum
    /// from any crate is likely to fulfill.
    pub fn error<E: Debug>(self, err: E) -> Self {
        LogItem {
            err_val: Some(format!("{err:?}").into()),
            ..self
        }
    }

    /// Add a validation status code.
    pub fn validation_status(self, status: &'static str) -> Self {
        LogItem {
            validation_status: Some(status.into()),
            ..self
        }
    }

    /// Record this item as a success.
    pub fn success(mut self, tracker: &mut StatusTracker) {
        self.kind = LogKind::Success;
        tracker.add_non_error(self);
    }

    /// Record this item as informational (a warning that does not fail the
    /// object being checked).
    pub fn informational(mut self, tracker: &mut StatusTracker) {
        self.kind = LogKind::Informational;
        tracker.add_non_error(self);
    }

    /// Record this item as a failure.
    ///
    /// Returns `Err(err)` if the tracker is configured to stop on the first
    /// error, `Ok(())` otherwise. _(See [`ErrorBehavior`].)_
    ///
    /// [`ErrorBehavior`]: crate::ErrorBehavior
    pub fn failure<E: Debug>(mut self, tracker: &mut StatusTracker, err: E) -> Result<(), E> {
        self.kind = LogKind::Failure;
        self.err_val = Some(format!("{err:?}").into());
        tracker.add_error(self, err)
    }

    /// Record this item as a failure, discarding the error value.
    ///
    /// Use this variant when the caller will fail the surrounding operation
    /// through some other path and only the log record is needed here.
    pub fn failure_no_throw<E: Debug>(mut self, tracker: &mut StatusTracker, err: E) {
        self.kind = LogKind::Failure;
        self.err_val = Some(format!("{err:?}").into());
        let _ = tracker.add_error(self, &err);
    }
}

/// Classifies a [`LogItem`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LogKind {
    /// This log item describes a successful check.
    Success,

    /// This log item describes a condition that is worth noting but does not
    /// fail the object being checked (for example, a stale CRL).
    Informational,

    /// This log item describes a failed check.
    Failure,
}

/// Creates a [`LogItem`] annotated with the source file and line number
/// where the log condition was discovered.
///
/// Takes three parameters, each of which may be a `'static str` or `String`:
///
/// * `label`: id of the object this item references (typically a certificate
///   or CRL id)
/// * `description`: human-readable reason for this item to have been
///   generated
/// * `function`: name of the function generating this item
///
/// The item defaults to [`LogKind::Informational`] until recorded via
/// [`LogItem::success`], [`LogItem::informational`], or [`LogItem::failure`].
#[macro_export]
macro_rules! log_item {
    ($label:expr, $description:expr, $function:expr) => {{
        $crate::LogItem {
            kind: $crate::LogKind::Informational,
            label: $label.into(),
            description: $description.into(),
            file: file!().into(),
            function: $function.into(),
            line: line!(),
            err_val: None,
            validation_status: None,
            object_id: None,
        }
    }};
}
