use std::fmt;

/// A git file mode, as printed in octal by `git diff`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FileMode {
    /// The file does not exist on this side of the diff.
    #[default]
    Nonexistent,
    Directory,
    RegularNonExecutableFile,
    RegularNonExecutableGroupWriteableFile,
    RegularExecutableFile,
    SymbolicLink,
    Gitlink,
}

impl FileMode {
    #[must_use]
    pub const fn bits(self) -> u32 {
        match self {
            Self::Nonexistent => 0,
            Self::Directory => 0o040000,
            Self::RegularNonExecutableFile => 0o100644,
            Self::RegularNonExecutableGroupWriteableFile => 0o100664,
            Self::RegularExecutableFile => 0o100755,
            Self::SymbolicLink => 0o120000,
            Self::Gitlink => 0o160000,
        }
    }

    #[must_use]
    pub const fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            0 => Some(Self::Nonexistent),
            0o040000 => Some(Self::Directory),
            0o100644 => Some(Self::RegularNonExecutableFile),
            0o100664 => Some(Self::RegularNonExecutableGroupWriteableFile),
            0o100755 => Some(Self::RegularExecutableFile),
            0o120000 => Some(Self::SymbolicLink),
            0o160000 => Some(Self::Gitlink),
            _ => None,
        }
    }

    /// Decode an octal mode string such as `100644`.
    #[must_use]
    pub fn from_octal(text: &str) -> Option<Self> {
        u32::from_str_radix(text, 8).ok().and_then(Self::from_bits)
    }

    #[must_use]
    pub const fn exists(self) -> bool {
        !matches!(self, Self::Nonexistent)
    }
}

impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06o}", self.bits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_known_modes() {
        assert_eq!(
            FileMode::from_octal("100644"),
            Some(FileMode::RegularNonExecutableFile)
        );
        assert_eq!(
            FileMode::from_octal("100755"),
            Some(FileMode::RegularExecutableFile)
        );
        assert_eq!(FileMode::from_octal("120000"), Some(FileMode::SymbolicLink));
        assert_eq!(FileMode::from_octal("160000"), Some(FileMode::Gitlink));
        assert_eq!(FileMode::from_octal("040000"), Some(FileMode::Directory));
    }

    #[test]
    fn rejects_unknown_modes() {
        assert_eq!(FileMode::from_octal("100600"), None);
        assert_eq!(FileMode::from_octal("999"), None);
        assert_eq!(FileMode::from_octal(""), None);
    }

    #[test]
    fn displays_as_six_octal_digits() {
        assert_eq!(FileMode::RegularNonExecutableGroupWriteableFile.to_string(), "100664");
        assert_eq!(FileMode::Directory.to_string(), "040000");
        assert_eq!(FileMode::Nonexistent.to_string(), "000000");
    }
}
