//! Ledger function table and per-backend naming conventions.
//!
//! Both ledgers expose the same logical functions, but each deploys them
//! under its own names. The chaincode side uses `PascalCase` names for every
//! function. The contract side uses short lowercase action names for writes,
//! reuses the chaincode names for reads, and has no commit log or package
//! listing at all.
//!
//! | Function | Chaincode | Contract |
//! |---|---|---|
//! | [`RawWrite`](LedgerFunction::RawWrite) | `RawWrite` | `rawwrite` |
//! | [`RawBatchWrite`](LedgerFunction::RawBatchWrite) | `RawBatchWrite` | `rawbatchwrite` |
//! | [`RawRead`](LedgerFunction::RawRead) | `RawRead` | `RawRead` |
//! | [`WriteCommitLog`](LedgerFunction::WriteCommitLog) | `WriteCommitLog` | - |
//! | [`ReadCommitHeight`](LedgerFunction::ReadCommitHeight) | `ReadCommitHeight` | - |
//! | [`ReadCommit`](LedgerFunction::ReadCommit) | `ReadCommit` | - |
//! | [`PackageWrite`](LedgerFunction::PackageWrite) | `PackageWrite` | `packagewrite` |
//! | [`PackageRead`](LedgerFunction::PackageRead) | `PackageRead` | `PackageRead` |
//! | [`PackageListRead`](LedgerFunction::PackageListRead) | `PackageListRead` | - |
//! | [`RecordTimeWrite`](LedgerFunction::RecordTimeWrite) | `RecordTimeWrite` | `recordtwrite` |
//! | [`RecordTimeRead`](LedgerFunction::RecordTimeRead) | `RecordTimeRead` | `RecordTimeRead` |
//! | [`LedgerIdWrite`](LedgerFunction::LedgerIdWrite) | `LedgerIDWrite` | `ledgeridwrite` |
//! | [`LedgerIdRead`](LedgerFunction::LedgerIdRead) | `LedgerIDRead` | `LedgerIDRead` |

use std::fmt;

/// A logical ledger function, independent of how a backend names it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum LedgerFunction {
    /// Write one state entry.
    RawWrite,
    /// Write a flattened `key, value, ...` sequence as one transaction.
    RawBatchWrite,
    /// Read one state entry.
    RawRead,
    /// Append a commit-log entry; returns the new index.
    WriteCommitLog,
    /// Read the highest assigned commit index.
    ReadCommitHeight,
    /// Read a commit-log entry by decimal index.
    ReadCommit,
    /// Write one package blob.
    PackageWrite,
    /// Read one package blob.
    PackageRead,
    /// Read the binary list of package cache keys.
    PackageListRead,
    /// Write the latest record time.
    RecordTimeWrite,
    /// Read the latest record time.
    RecordTimeRead,
    /// Write the ledger identity.
    LedgerIdWrite,
    /// Read the ledger identity.
    LedgerIdRead,
}

impl LedgerFunction {
    /// Every function, in table order.
    pub const ALL: [LedgerFunction; 13] = [
        Self::RawWrite,
        Self::RawBatchWrite,
        Self::RawRead,
        Self::WriteCommitLog,
        Self::ReadCommitHeight,
        Self::ReadCommit,
        Self::PackageWrite,
        Self::PackageRead,
        Self::PackageListRead,
        Self::RecordTimeWrite,
        Self::RecordTimeRead,
        Self::LedgerIdWrite,
        Self::LedgerIdRead,
    ];

    /// Returns `true` for state-changing functions, which go through `invoke`.
    #[must_use]
    pub fn is_write(self) -> bool {
        matches!(
            self,
            Self::RawWrite
                | Self::RawBatchWrite
                | Self::WriteCommitLog
                | Self::PackageWrite
                | Self::RecordTimeWrite
                | Self::LedgerIdWrite
        )
    }
}

impl fmt::Display for LedgerFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The chaincode name is the canonical spelling.
        f.write_str(NamingConvention::Chaincode.function_name(*self).unwrap_or("unknown"))
    }
}

/// How a backend spells the functions it deploys.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum NamingConvention {
    /// Chaincode deployment: every function, `PascalCase`.
    #[default]
    Chaincode,
    /// Contract deployment: lowercase write actions, no commit log.
    Contract,
}

impl NamingConvention {
    /// Returns the name this convention deploys `function` under, or `None`
    /// when the backend does not provide it.
    #[must_use]
    pub fn function_name(self, function: LedgerFunction) -> Option<&'static str> {
        use LedgerFunction::*;

        match (self, function) {
            (Self::Chaincode, RawWrite) => Some("RawWrite"),
            (Self::Chaincode, RawBatchWrite) => Some("RawBatchWrite"),
            (Self::Chaincode, WriteCommitLog) => Some("WriteCommitLog"),
            (Self::Chaincode, ReadCommitHeight) => Some("ReadCommitHeight"),
            (Self::Chaincode, ReadCommit) => Some("ReadCommit"),
            (Self::Chaincode, PackageWrite) => Some("PackageWrite"),
            (Self::Chaincode, PackageListRead) => Some("PackageListRead"),
            (Self::Chaincode, RecordTimeWrite) => Some("RecordTimeWrite"),
            (Self::Chaincode, LedgerIdWrite) => Some("LedgerIDWrite"),

            (Self::Contract, RawWrite) => Some("rawwrite"),
            (Self::Contract, RawBatchWrite) => Some("rawbatchwrite"),
            (Self::Contract, PackageWrite) => Some("packagewrite"),
            (Self::Contract, RecordTimeWrite) => Some("recordtwrite"),
            (Self::Contract, LedgerIdWrite) => Some("ledgeridwrite"),
            (Self::Contract, WriteCommitLog | ReadCommitHeight | ReadCommit | PackageListRead) => {
                None
            },

            // Reads share one spelling across deployments.
            (_, RawRead) => Some("RawRead"),
            (_, PackageRead) => Some("PackageRead"),
            (_, RecordTimeRead) => Some("RecordTimeRead"),
            (_, LedgerIdRead) => Some("LedgerIDRead"),
        }
    }

    /// Resolves a deployed function name back to its logical function.
    #[must_use]
    pub fn resolve(self, name: &str) -> Option<LedgerFunction> {
        LedgerFunction::ALL.into_iter().find(|f| self.function_name(*f) == Some(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chaincode_names_every_function() {
        for function in LedgerFunction::ALL {
            assert!(NamingConvention::Chaincode.function_name(function).is_some(), "{function:?}");
        }
    }

    #[test]
    fn test_contract_write_names_are_lowercase() {
        for function in LedgerFunction::ALL.into_iter().filter(|f| f.is_write()) {
            if let Some(name) = NamingConvention::Contract.function_name(function) {
                assert_eq!(name, name.to_lowercase());
            }
        }
    }

    #[test]
    fn test_contract_has_no_commit_log() {
        let contract = NamingConvention::Contract;
        assert_eq!(contract.function_name(LedgerFunction::WriteCommitLog), None);
        assert_eq!(contract.function_name(LedgerFunction::ReadCommit), None);
        assert_eq!(contract.function_name(LedgerFunction::ReadCommitHeight), None);
        assert_eq!(contract.function_name(LedgerFunction::PackageListRead), None);
    }

    #[test]
    fn test_resolve_round_trips_names() {
        for convention in [NamingConvention::Chaincode, NamingConvention::Contract] {
            for function in LedgerFunction::ALL {
                if let Some(name) = convention.function_name(function) {
                    assert_eq!(convention.resolve(name), Some(function));
                }
            }
        }
        assert_eq!(NamingConvention::Chaincode.resolve("rawwrite"), None);
        assert_eq!(NamingConvention::Contract.resolve("RawWrite"), None);
    }

    #[test]
    fn test_display_uses_chaincode_spelling() {
        assert_eq!(LedgerFunction::LedgerIdWrite.to_string(), "LedgerIDWrite");
    }
}
