//! scriptmirror - git plumbing for mirroring script packages
//!
//! This crate provides the two pieces a mirroring driver needs: a git
//! repository handle with in-memory commit transactions and annotated tags,
//! and a rate-limited, retrying client for the hosting API the mirrors are
//! published to.
//!
//! # Example
//!
//! ```no_run
//! use scriptmirror::storage::{Identity, Repository, Tag};
//!
//! let repo = Repository::create("./mirror.git", true).unwrap();
//! let author = Identity::new("Mirror Bot", "bot@example.com");
//! repo.commit("version 1.0", &author, |tx| tx.add("plugin/rails.vim", "\" rails\n"))
//!     .unwrap();
//! repo.create_tag(&Tag::new("1.0", "version 1.0", author)).unwrap();
//! ```

pub mod clock;
pub mod config;
pub mod remote;
pub mod retry;
pub mod storage;
