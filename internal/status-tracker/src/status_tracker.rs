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

use std::{fmt::Debug, iter::Iterator};

use crate::{LogItem, LogKind};

/// A `StatusTracker` is used in the validation logic of `pkd` and related
/// crates to control error-handling behavior and aggregate log messages as
/// they are generated.
#[derive(Debug, Default)]
pub struct StatusTracker {
    error_behavior: ErrorBehavior,
    logged_items: Vec<LogItem>,
    object_ids: Vec<String>,
}

impl StatusTracker {
    /// Returns a [`StatusTracker`] with the specified [`ErrorBehavior`].
    pub fn with_error_behavior(error_behavior: ErrorBehavior) -> Self {
        Self {
            error_behavior,
            logged_items: vec![],
            object_ids: vec![],
        }
    }

    /// Returns the current list of validation log items.
    pub fn logged_items(&self) -> &[LogItem] {
        &self.logged_items
    }

    /// Appends the contents of another [`StatusTracker`] to this list of
    /// validation log items.
    pub fn append(&mut self, other: &StatusTracker) {
        for log_item in other.logged_items() {
            self.add_non_error(log_item.clone());
        }
    }

    /// Adds a non-error [`LogItem`] to this status tracker.
    ///
    /// Primarily intended for use by [`LogItem::success()`]
    /// or [`LogItem::informational()`].
    pub fn add_non_error(&mut self, mut log_item: LogItem) {
        if let Some(object_id) = self.object_ids.last() {
            log_item.object_id = Some(object_id.to_string().into());
        }
        self.logged_items.push(log_item);
    }

    /// Adds an error-case [`LogItem`] to this status tracker.
    ///
    /// Will return `Err(err)` if configured to stop immediately on errors or
    /// `Ok(())` if configured to continue on errors. _(See [`ErrorBehavior`].)_
    ///
    /// Primarily intended for use by [`LogItem::failure()`].
    pub fn add_error<E>(&mut self, mut log_item: LogItem, err: E) -> Result<(), E> {
        if let Some(object_id) = self.object_ids.last() {
            log_item.object_id = Some(object_id.to_string().into());
        }

        self.logged_items.push(log_item);

        match self.error_behavior {
            ErrorBehavior::StopOnFirstError => Err(err),
            ErrorBehavior::ContinueWhenPossible => Ok(()),
        }
    }

    /// Returns the [`LogItem`]s that describe failed checks.
    pub fn filter_errors(&self) -> impl Iterator<Item = &LogItem> {
        self.logged_items()
            .iter()
            .filter(|item| item.kind == LogKind::Failure)
    }

    /// Returns `true` if the validation log contains a specific status code.
    pub fn has_status(&self, val: &str) -> bool {
        self.logged_items().iter().any(|vi| {
            if let Some(vs) = &vi.validation_status {
                vs == val
            } else {
                false
            }
        })
    }

    /// Returns `true` if the validation log contains a specific error.
    pub fn has_error<E: Debug>(&self, err: E) -> bool {
        let err_type = format!("{:?}", &err);
        self.logged_items().iter().any(|vi| {
            if let Some(e) = &vi.err_val {
                e == &err_type
            } else {
                false
            }
        })
    }

    /// Returns `true` if the validation log contains any error.
    pub fn has_any_error(&self) -> bool {
        self.filter_errors().next().is_some()
    }

    /// Keeps track of the current object (certificate or CRL) id, if any.
    ///
    /// The current id is attached to any log items that are created until the
    /// matching [`pop_current_object`] call.
    ///
    /// [`pop_current_object`]: Self::pop_current_object
    pub fn push_current_object<S: Into<String>>(&mut self, id: S) {
        self.object_ids.push(id.into());
    }

    /// Removes the current object id, if any.
    pub fn pop_current_object(&mut self) -> Option<String> {
        self.object_ids.pop()
    }
}

/// `ErrorBehavior` configures the behavior of [`StatusTracker`] when its
/// [`add_error`] function is called.
///
/// [`add_error`]: StatusTracker::add_error
#[derive(Debug, Eq, PartialEq)]
pub enum ErrorBehavior {
    /// If an error is encountered, stop validation immediately.
    StopOnFirstError,

    /// If an error is encountered, log it and continue validation as much as
    /// possible.
    ContinueWhenPossible,
}

impl Default for ErrorBehavior {
    fn default() -> Self {
        Self::ContinueWhenPossible
    }
}

#[cfg(test)]
mod tests {
    use crate::{log_item, validation_codes::CERTIFICATE_EXPIRED, ErrorBehavior, StatusTracker};

    #[test]
    fn continue_when_possible_collects_errors() {
        let mut tracker = StatusTracker::default();

        log_item!("cert-1", "certificate expired", "test_fn")
            .validation_status(CERTIFICATE_EXPIRED)
            .failure(&mut tracker, "expired")
            .unwrap();

        log_item!("cert-2", "signature validated", "test_fn").success(&mut tracker);

        assert_eq!(tracker.logged_items().len(), 2);
        assert_eq!(tracker.filter_errors().count(), 1);
        assert!(tracker.has_status(CERTIFICATE_EXPIRED));
        assert!(tracker.has_any_error());
    }

    #[test]
    fn stop_on_first_error_returns_err() {
        let mut tracker = StatusTracker::with_error_behavior(ErrorBehavior::StopOnFirstError);

        let result = log_item!("cert-1", "certificate expired", "test_fn")
            .failure(&mut tracker, "expired");

        assert!(result.is_err());
        assert_eq!(tracker.logged_items().len(), 1);
    }

    #[test]
    fn current_object_id_is_attached() {
        let mut tracker = StatusTracker::default();

        tracker.push_current_object("cert-42");
        log_item!("chain", "issuer not found", "test_fn").failure_no_throw(&mut tracker, "missing");
        tracker.pop_current_object();

        log_item!("chain", "untagged", "test_fn").informational(&mut tracker);

        assert_eq!(
            tracker.logged_items()[0].object_id.as_deref(),
            Some("cert-42")
        );
        assert!(tracker.logged_items()[1].object_id.is_none());
    }
}
