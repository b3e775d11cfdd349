// SPDX-License-Identifier: GPL-3.0-only

//! Scripted camera and microphone authorization

use crate::backends::camera::Authorization;
use crate::backends::camera::types::{AuthorizationStatus, MediaKind};
use futures::channel::oneshot;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Authorization provider with fixed answers
///
/// A request for `NotDetermined` media resolves to the configured answer and
/// updates the stored status, the way a platform prompt would.
pub struct VirtualAuthorization {
    statuses: Mutex<HashMap<MediaKind, AuthorizationStatus>>,
    grant_on_request: bool,
    requests: AtomicUsize,
}

impl VirtualAuthorization {
    /// Camera and microphone already authorized
    pub fn granted() -> Self {
        Self::new(AuthorizationStatus::Authorized, AuthorizationStatus::Authorized, true)
    }

    pub fn new(
        camera: AuthorizationStatus,
        microphone: AuthorizationStatus,
        grant_on_request: bool,
    ) -> Self {
        let statuses = HashMap::from([(MediaKind::Video, camera), (MediaKind::Audio, microphone)]);
        Self {
            statuses: Mutex::new(statuses),
            grant_on_request,
            requests: AtomicUsize::new(0),
        }
    }

    /// Number of prompts shown so far
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Authorization for VirtualAuthorization {
    fn status(&self, media: MediaKind) -> AuthorizationStatus {
        self.statuses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&media)
            .copied()
            .unwrap_or(AuthorizationStatus::NotDetermined)
    }

    fn request_access(&self, media: MediaKind) -> oneshot::Receiver<bool> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let granted = self.grant_on_request;
        let status = if granted {
            AuthorizationStatus::Authorized
        } else {
            AuthorizationStatus::Denied
        };
        self.statuses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(media, status);
        debug!(%media, granted, "Authorization requested");

        let (tx, rx) = oneshot::channel();
        let _ = tx.send(granted);
        rx
    }
}
