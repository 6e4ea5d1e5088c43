// Copyright 2018 Kodebox, Inc.
// This file is part of CodeChain.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use std::fmt;

/// Opaque error surfaced by a `Trie`/`Database`/`SnapshotTree` implementation.
/// The core never inspects its contents; it only stores, re-displays and
/// propagates it.
#[derive(Debug, Clone)]
pub struct ExternalError(pub String);

impl fmt::Display for ExternalError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub enum Error {
    /// A database or trie read failed. Memoised on the instance the first
    /// time it is observed (see `StateDb::memoised_error`).
    Trie(ExternalError),
    /// A worker spawned during `Commit`'s concurrent fan-out failed.
    Commit(ExternalError),
    /// `Commit` was refused by a chain-policy blocker (e.g. a tx-filter
    /// sentinel) set on the instance.
    ChainPolicyBlocked(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Trie(err) => write!(f, "trie read failed: {}", err),
            Error::Commit(err) => write!(f, "commit worker failed: {}", err),
            Error::ChainPolicyBlocked(reason) => write!(f, "commit refused: {}", reason),
        }
    }
}

impl std::error::Error for Error {}

impl From<ExternalError> for Error {
    fn from(err: ExternalError) -> Self {
        Error::Trie(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
