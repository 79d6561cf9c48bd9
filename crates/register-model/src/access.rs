//! Access modes shared by registers and fields.

use std::fmt;

/// Read/write permission attached to a register or a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum AccessMode {
    /// Readable and writable.
    ReadWrite,
    /// Writes are masked out.
    ReadOnly,
    /// Reads return zero through the read mask.
    WriteOnly,
    /// Permissions are derived from the fields defined on the register.
    #[default]
    Unspecified,
}

impl AccessMode {
    /// Short two-letter tag used in compact dumps.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::ReadWrite => "RW",
            Self::ReadOnly => "RO",
            Self::WriteOnly => "WO",
            Self::Unspecified => "NA",
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ReadWrite => "Read-Write",
            Self::ReadOnly => "Read-Only",
            Self::WriteOnly => "Write-Only",
            Self::Unspecified => "Field-level-defined",
        }
    }

    /// Whether a field with mode `field` may be declared inside a register with this mode.
    ///
    /// Unspecified on either side is always accepted.
    #[must_use]
    pub const fn admits_field(self, field: Self) -> bool {
        matches!(
            (self, field),
            (Self::Unspecified, _)
                | (_, Self::Unspecified)
                | (Self::ReadWrite, Self::ReadWrite)
                | (Self::ReadOnly, Self::ReadOnly)
                | (Self::WriteOnly, Self::WriteOnly)
        )
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::AccessMode;

    #[test]
    fn fixed_register_modes_reject_other_field_modes() {
        let fixed = [
            AccessMode::ReadWrite,
            AccessMode::ReadOnly,
            AccessMode::WriteOnly,
        ];
        for register in fixed {
            for field in fixed {
                assert_eq!(register.admits_field(field), register == field);
            }
            assert!(register.admits_field(AccessMode::Unspecified));
            assert!(AccessMode::Unspecified.admits_field(register));
        }
    }

    #[test]
    fn labels_match_dump_vocabulary() {
        assert_eq!(AccessMode::Unspecified.to_string(), "Field-level-defined");
        assert_eq!(AccessMode::WriteOnly.tag(), "WO");
    }
}
