// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Rigup bootstraps a developer machine from a declarative manifest.
//!
//! The original shape of this kind of tooling is a pile of shell scripts:
//! install Bun, install nvm, install Rust, append the right export lines to
//! the right rc files, symlink the dotfiles, clone the repos, decrypt the
//! secrets. Rigup keeps the exact same observable behavior, but hoists the
//! two things shell scripts are worst at into one place: idempotent rc-file
//! mutation, and a declarative list of what the machine should have.
//!
//! Everything else stays glue. External tools do the real work, rigup just
//! checks whether work is needed, invokes them in order, and stops when a
//! required piece fails.
//!
//! # Layers
//!
//! 1. [`proc`], [`path`], and [`fetch`]: process invocation, path
//!    resolution, and retrying downloads.
//! 2. [`rc`] and [`links`]: idempotent primitives for rc files and
//!    symlinks.
//! 3. [`manifest`]: the declarative description of the machine.
//! 4. [`repo`] and [`secrets`]: cloning and secrets decryption.
//! 5. [`step`]: the plan and orchestrator tying it all together.
//! 6. [`menu`]: interactive pickers for the bootstrapped machine.

pub mod fetch;
pub mod links;
pub mod manifest;
pub mod menu;
pub mod path;
pub mod proc;
pub mod rc;
pub mod repo;
pub mod secrets;
pub mod step;

pub use manifest::Manifest;
pub use step::{Plan, StepContext};
