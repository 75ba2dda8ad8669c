// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! At-most-once async initialisation.

use std::future::Future;

use tokio::sync::OnceCell;

/// A value produced by an async initializer that runs at most once.
///
/// Concurrent callers of [`OnceInit::get_or_init`] all wait on the first
/// initializer; later calls return the stored value without running theirs.
/// A failed initialisation is stored like any other value, so callers that
/// want a retry must not wrap the error in `T`.
#[derive(Debug)]
pub struct OnceInit<T> {
    cell: OnceCell<T>,
}

impl<T> OnceInit<T> {
    pub fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    pub async fn get_or_init<F, Fut>(&self, init: F) -> &T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.cell.get_or_init(init).await
    }

    /// The value, if initialisation already completed.
    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}

impl<T> Default for OnceInit<T> {
    fn default() -> Self {
        Self::new()
    }
}
