use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

bitflags! {
    /// Platforms a flag definition can be offered on.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
    pub struct Platform: u16 {
        const MAC = 1 << 0;
        const WINDOWS = 1 << 1;
        const LINUX = 1 << 2;
        const CHROMEOS = 1 << 3;
        const ANDROID = 1 << 4;
        /// Only the device owner may toggle it (multi-user systems).
        const CHROMEOS_OWNER_ONLY = 1 << 5;
        const IOS = 1 << 6;
        const FUCHSIA = 1 << 7;
        const LACROS = 1 << 8;

        const DESKTOP = Self::MAC.bits()
            | Self::WINDOWS.bits()
            | Self::LINUX.bits()
            | Self::CHROMEOS.bits()
            | Self::FUCHSIA.bits()
            | Self::LACROS.bits();
        const MOBILE = Self::ANDROID.bits() | Self::IOS.bits();
    }
}

const NAMES: &[(Platform, &str)] = &[
    (Platform::MAC, "mac"),
    (Platform::WINDOWS, "windows"),
    (Platform::LINUX, "linux"),
    (Platform::CHROMEOS, "chromeos"),
    (Platform::ANDROID, "android"),
    (Platform::CHROMEOS_OWNER_ONLY, "chromeos-owner-only"),
    (Platform::IOS, "ios"),
    (Platform::FUCHSIA, "fuchsia"),
    (Platform::LACROS, "lacros"),
];

impl Platform {
    /// The platform this binary was compiled for.
    #[must_use]
    pub const fn current() -> Self {
        if cfg!(target_os = "ios") {
            Self::IOS
        } else if cfg!(target_os = "macos") {
            Self::MAC
        } else if cfg!(target_os = "windows") {
            Self::WINDOWS
        } else if cfg!(target_os = "android") {
            Self::ANDROID
        } else if cfg!(target_os = "fuchsia") {
            Self::FUCHSIA
        } else {
            Self::LINUX
        }
    }

    /// Mask used when deciding what to materialize for this platform.
    ///
    /// The owner-managed OS also honours owner-only definitions, since the
    /// owner's choices are applied device-wide.
    #[must_use]
    pub const fn materialization_mask(self) -> Self {
        if self.contains(Self::CHROMEOS) { self.union(Self::CHROMEOS_OWNER_ONLY) } else { self }
    }

    /// Human-readable names of every platform in the set, in a stable order.
    #[must_use]
    pub fn names(self) -> Vec<&'static str> {
        NAMES.iter().filter(|(bit, _)| self.contains(*bit)).map(|(_, name)| *name).collect()
    }

    /// Parses one platform or group name (`"mac"`, `"desktop"`, `"all"`).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "desktop" => Some(Self::DESKTOP),
            "mobile" => Some(Self::MOBILE),
            "all" | "*" => Some(Self::all()),
            other => NAMES.iter().find(|(_, known)| *known == other).map(|(bit, _)| *bit),
        }
    }
}

impl From<u16> for Platform {
    fn from(bits: u16) -> Self {
        Self::from_bits_truncate(bits)
    }
}

impl Serialize for Platform {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(self.names())
    }
}

/// Accepts either raw bits (`12`) or a list of names (`["mac", "desktop"]`).
impl<'de> Deserialize<'de> for Platform {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Bits(u16),
            Names(Vec<String>),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Bits(bits) => Self::from_bits_retain(bits),
            Repr::Names(names) => names.iter().try_fold(Self::empty(), |acc, name| {
                Self::from_name(name)
                    .map(|bit| acc | bit)
                    .ok_or_else(|| de::Error::custom(format_args!("unknown platform `{name}`")))
            })?,
        })
    }
}
