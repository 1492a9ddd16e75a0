//! The capability a repository host has to provide.

use crate::remote::error::RemoteResult;
use crate::remote::types::{DeleteResponse, DeleteToken, FeatureToggles, RepoInfo, RepoMetadata};

/// Raw operations against a hosting API.
///
/// Implementations own transport and authentication. They report a missing
/// repository as [`RemoteError::NotFound`](crate::remote::RemoteError::NotFound)
/// and everything else they can't complete as
/// [`RemoteError::Api`](crate::remote::RemoteError::Api). Methods take
/// `&mut self` so stateful clients (sessions, cursors, test fakes) need no
/// interior locking of their own.
pub trait RepoHost: Send {
    fn get(&mut self, name: &str) -> RemoteResult<RepoInfo>;

    fn update(&mut self, name: &str, features: &FeatureToggles) -> RemoteResult<()>;

    fn create(&mut self, name: &str, metadata: &RepoMetadata) -> RemoteResult<RepoInfo>;

    /// First phase of a delete. `None` means the host gave no token.
    fn delete_request(&mut self, name: &str) -> RemoteResult<Option<DeleteToken>>;

    /// Second phase: replay the token from [`delete_request`](Self::delete_request).
    fn delete_confirm(&mut self, name: &str, token: &DeleteToken) -> RemoteResult<DeleteResponse>;

    /// One page of the owner's repositories, 1-based. An empty page ends the listing.
    fn list(&mut self, page: u32) -> RemoteResult<Vec<RepoInfo>>;
}

impl<H: RepoHost + ?Sized> RepoHost for Box<H> {
    fn get(&mut self, name: &str) -> RemoteResult<RepoInfo> {
        (**self).get(name)
    }

    fn update(&mut self, name: &str, features: &FeatureToggles) -> RemoteResult<()> {
        (**self).update(name, features)
    }

    fn create(&mut self, name: &str, metadata: &RepoMetadata) -> RemoteResult<RepoInfo> {
        (**self).create(name, metadata)
    }

    fn delete_request(&mut self, name: &str) -> RemoteResult<Option<DeleteToken>> {
        (**self).delete_request(name)
    }

    fn delete_confirm(&mut self, name: &str, token: &DeleteToken) -> RemoteResult<DeleteResponse> {
        (**self).delete_confirm(name, token)
    }

    fn list(&mut self, page: u32) -> RemoteResult<Vec<RepoInfo>> {
        (**self).list(page)
    }
}
