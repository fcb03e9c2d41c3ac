//! Motor registry read from the file preamble
//!
//! Scan commands name motors by mnemonic (`tth`) while column labels use the
//! full name (`TwoTheta`). The preamble declares both, in matching order,
//! on `#o` and `#O` lines that may continue over several lines.

use crate::lines::{LineCursor, MappedFile};
use crate::types::{Result, SpecError, MNEMONIC_TAG, MOTOR_NAME_TAG, SCAN_TAG};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, instrument};

/// Ordered motor names plus the mnemonic to name mapping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MotorRegistry {
    motors: Vec<String>,
    mnemonics: HashMap<String, String>,
}

impl MotorRegistry {
    /// Read the preamble of a file
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn build<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mapped = MappedFile::open(path.as_ref())?;
        let registry = Self::from_bytes(mapped.bytes());
        debug!(
            motors = registry.motors.len(),
            mnemonics = registry.mnemonics.len(),
            "Header read"
        );
        Ok(registry)
    }

    /// Read the preamble of an in-memory copy of a file
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut mnems: Vec<String> = Vec::new();
        let mut names: Vec<String> = Vec::new();

        for line in LineCursor::new(data).take_while(|l| !l.starts_with(SCAN_TAG)) {
            let target = if line.starts_with(MNEMONIC_TAG) {
                &mut mnems
            } else if line.starts_with(MOTOR_NAME_TAG) {
                &mut names
            } else {
                continue;
            };
            target.extend(line.text().split_whitespace().skip(1).map(str::to_string));
        }

        if mnems.len() != names.len() {
            debug!(
                mnemonics = mnems.len(),
                names = names.len(),
                "Unpaired motor declarations ignored"
            );
        }

        let mnemonics = mnems.into_iter().zip(names.iter().cloned()).collect();

        Self {
            motors: names,
            mnemonics,
        }
    }

    /// Full motor names in declared order
    pub fn motors(&self) -> &[String] {
        &self.motors
    }

    /// Mnemonic to full name mapping
    pub fn mnemonics(&self) -> &HashMap<String, String> {
        &self.mnemonics
    }

    pub fn name_for(&self, mnemonic: &str) -> Option<&str> {
        self.mnemonics.get(mnemonic).map(String::as_str)
    }

    /// Full name for a mnemonic used by scan `scan`
    pub fn resolve(&self, scan: u32, mnemonic: &str) -> Result<&str> {
        self.name_for(mnemonic)
            .ok_or_else(|| SpecError::MissingRegistryEntry {
                scan,
                mnemonic: mnemonic.to_string(),
            })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.motors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.motors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREAMBLE: &[u8] = b"#F LNSCO\n#E 1485000000\n#D Sat Jan 14 12:34:56 2017\n\
#O0 TwoTheta  Theta  Chi\n#O1 Phi\n#o0 tth th chi\n#o1 phi\n\n\
#S 1 ascan tth 0 1 10 1\n#O0 Bogus\n#o0 bog\n";

    #[test]
    fn test_pairs_across_continuation_lines() {
        let registry = MotorRegistry::from_bytes(PREAMBLE);

        assert_eq!(registry.motors(), &["TwoTheta", "Theta", "Chi", "Phi"]);
        assert_eq!(registry.name_for("tth"), Some("TwoTheta"));
        assert_eq!(registry.name_for("phi"), Some("Phi"));
        assert_eq!(registry.mnemonics().len(), 4);
    }

    #[test]
    fn test_stops_at_first_scan() {
        let registry = MotorRegistry::from_bytes(PREAMBLE);
        assert_eq!(registry.name_for("bog"), None);
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_resolve_missing_mnemonic() {
        let registry = MotorRegistry::from_bytes(PREAMBLE);
        let err = registry.resolve(7, "xyz").unwrap_err();
        assert!(matches!(
            err,
            SpecError::MissingRegistryEntry { scan: 7, ref mnemonic } if mnemonic == "xyz"
        ));
    }

    #[test]
    fn test_unpaired_names_kept_in_motor_list() {
        let registry = MotorRegistry::from_bytes(b"#O0 A B\n#o0 a\n");
        assert_eq!(registry.motors(), &["A", "B"]);
        assert_eq!(registry.mnemonics().len(), 1);
    }

    #[test]
    fn test_empty_preamble() {
        let registry = MotorRegistry::from_bytes(b"#S 1 ascan\n");
        assert!(registry.is_empty());
    }
}
