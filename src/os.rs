//! Platform probing: OS tag, classpath separator, and platform-specific JVM flags.

/// The three OS tags recognized by Mojang version manifests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
    Windows,
    Osx,
    Linux,
}

impl Os {
    /// The OS of the machine this code is running on.
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::Osx
        } else {
            Self::Linux
        }
    }

    /// The tag used in version manifests and rule clauses (`"windows"`, `"osx"`, `"linux"`).
    pub fn tag(self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::Osx => "osx",
            Self::Linux => "linux",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "windows" => Some(Self::Windows),
            "osx" | "macos" => Some(Self::Osx),
            "linux" => Some(Self::Linux),
            _ => None,
        }
    }

    /// The classpath entry separator used in `-cp` on this OS.
    pub fn path_sep(self) -> char {
        match self {
            Self::Windows => ';',
            _ => ':',
        }
    }

    /// The extra, unconditional JVM flag contributed by this platform.
    ///
    /// On osx this is only meaningful for the `-XstartOnFirstThread` quirk, which the
    /// caller additionally gates on the descriptor's minor version (see
    /// [`crate::args`]).
    pub fn jvm_extra_flag(self) -> &'static str {
        match self {
            Self::Windows => {
                "-XX:HeapDumpPath=MojangTricksIntelDriversForPerformance_javaw.exe_minecraft.exe.heapdump"
            }
            Self::Osx => "-XstartOnFirstThread",
            Self::Linux => "-Xss1M",
        }
    }

    /// The native-library classifier suffix used for this OS's natives archives
    /// (`natives-windows`, `natives-linux`, `natives-osx`).
    pub fn natives_classifier(self) -> &'static str {
        match self {
            Self::Windows => "natives-windows",
            Self::Osx => "natives-osx",
            Self::Linux => "natives-linux",
        }
    }

    /// A legacy alternate classifier some older manifests use instead of `natives-osx`.
    pub fn natives_classifier_fallback(self) -> Option<&'static str> {
        match self {
            Self::Osx => Some("natives-macos"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_sep_matches_os() {
        assert_eq!(Os::Windows.path_sep(), ';');
        assert_eq!(Os::Linux.path_sep(), ':');
        assert_eq!(Os::Osx.path_sep(), ':');
    }

    #[test]
    fn tag_round_trips() {
        for os in [Os::Windows, Os::Osx, Os::Linux] {
            assert_eq!(Os::from_tag(os.tag()), Some(os));
        }
    }
}
