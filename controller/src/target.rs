// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! Resolving the `-i/--interface` argument of a command into a PCI function.

use crate::Error;
use hikp_messages::Bdf;
use std::path::Path;
use std::path::PathBuf;

/// Names and PCI addresses must be shorter than this.
pub const IFNAMSIZ: usize = 16;

/// The only kernel driver whose interfaces can be queried by name.
pub const HNS3_DRIVER_NAME: &str = "hns3";

/// The PCI function a command is aimed at.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Target {
    pub bdf: Bdf,
    /// The interface name, if the target was given as one.
    pub dev_name: Option<String>,
}

impl Target {
    /// Fail unless the target is a physical function.
    pub fn check_pf(&self) -> Result<(), Error> {
        if self.bdf.dev() != 0 {
            return Err(Error::VfUnsupported);
        }
        Ok(())
    }
}

fn hex_field(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(s, 16).ok()
}

fn dec_field(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Parse `dddd:bb:dd.f` or `bb:dd.f`.
///
/// Domain, bus and device are hex and the function is decimal. Nothing may
/// trail the function.
pub fn parse_bdf(s: &str) -> Option<Bdf> {
    if s.len() >= IFNAMSIZ {
        return None;
    }
    let (prefix, fun) = s.rsplit_once('.')?;
    let fun = dec_field(fun)?;
    let fields = prefix.split(':').map(hex_field).collect::<Option<Vec<_>>>()?;
    let (domain, bus, dev) = match fields[..] {
        [domain, bus, dev] => (domain, bus, dev),
        [bus, dev] => (0, bus, dev),
        _ => return None,
    };
    Bdf::new(domain, bus, dev, fun).ok()
}

/// Parse an unsigned 32-bit value the way `strtol` does with base 0.
///
/// A `0x` prefix selects hex and a leading `0` octal. The whole string must be
/// consumed.
pub fn string_toui(s: &str) -> Result<u32, Error> {
    let invalid = || Error::InvalidArgument(format!("invalid unsigned value '{s}'"));
    // strtol converts nothing at all into zero, with the end at the start.
    if s.is_empty() {
        return Ok(0);
    }
    let trimmed = s.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let (radix, digits) = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
        .filter(|hex| hex.bytes().next().is_some_and(|b| b.is_ascii_hexdigit()))
    {
        (16, hex)
    } else if digits.len() > 1 && digits.starts_with('0') {
        (8, &digits[1..])
    } else {
        (10, digits)
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(invalid());
    }
    let value = u64::from_str_radix(digits, radix).map_err(|_| invalid())?;
    if negative && value != 0 {
        return Err(invalid());
    }
    u32::try_from(value).map_err(|_| invalid())
}

/// Resolves targets, looking up interface names in sysfs.
#[derive(Clone, Debug)]
pub struct TargetResolver {
    sysfs_root: PathBuf,
}

impl TargetResolver {
    pub fn new(sysfs_root: impl Into<PathBuf>) -> Self {
        Self {
            sysfs_root: sysfs_root.into(),
        }
    }

    /// Resolve `name`, a PCI address or an hns3 interface name.
    pub fn resolve(&self, name: &str) -> Result<Target, Error> {
        if let Some(bdf) = parse_bdf(name) {
            return Ok(Target {
                bdf,
                dev_name: None,
            });
        }
        self.resolve_name(name)
            .map_err(|e| Error::UnknownDevice(Some(Box::new(e))))
    }

    fn resolve_name(&self, name: &str) -> Result<Target, Error> {
        if name.len() >= IFNAMSIZ {
            return Err(Error::InvalidArgument(String::from(
                "parameter of target name is too long.",
            )));
        }
        let unsupported =
            || Error::InvalidArgument(String::from("device name error or unsupported."));
        if name.is_empty() || name.contains('/') {
            return Err(unsupported());
        }
        let device = self.sysfs_root.join("class/net").join(name).join("device");
        let bdf = link_name(&device)
            .as_deref()
            .and_then(|pci| parse_bdf(pci))
            .ok_or_else(unsupported)?;
        match link_name(&device.join("driver")) {
            Some(driver) if driver == HNS3_DRIVER_NAME => Ok(Target {
                bdf,
                dev_name: Some(String::from(name)),
            }),
            _ => Err(unsupported()),
        }
    }
}

fn link_name(path: &Path) -> Option<String> {
    let target = std::fs::read_link(path).ok()?;
    target.file_name()?.to_str().map(String::from)
}

#[cfg(test)]
mod tests {
    use super::parse_bdf;
    use super::string_toui;
    use super::Target;
    use super::TargetResolver;
    use crate::Error;
    use hikp_messages::Bdf;
    use std::os::unix::fs::symlink;
    use std::path::Path;

    #[test]
    fn test_parse_bdf() {
        assert_eq!(parse_bdf("0000:bd:00.0"), Bdf::new(0, 0xbd, 0, 0).ok());
        assert_eq!(parse_bdf("0001:7d:1f.7"), Bdf::new(1, 0x7d, 0x1f, 7).ok());
        assert_eq!(parse_bdf("bd:00.1"), Bdf::new(0, 0xbd, 0, 1).ok());
        for bad in [
            "0000:bd:00.0abcdef",
            "0000:00:00.0",
            "00:00.0",
            "0000:bd:20.0",
            "0000:bd:00.8",
            "10000:bd:00.0",
            "bd:00",
            "bd.00.0",
            "0000:bd:00.",
            ":bd:00.0",
            "0:0000:bd:00.0",
            "eth0",
        ] {
            assert_eq!(parse_bdf(bad), None, "{bad}");
        }
    }

    #[test]
    fn test_string_toui() {
        assert_eq!(string_toui("42").unwrap(), 42);
        assert_eq!(string_toui("0x1f").unwrap(), 31);
        assert_eq!(string_toui("0X10").unwrap(), 16);
        assert_eq!(string_toui("010").unwrap(), 8);
        assert_eq!(string_toui("0").unwrap(), 0);
        assert_eq!(string_toui("+7").unwrap(), 7);
        assert_eq!(string_toui("4294967295").unwrap(), u32::MAX);
        assert_eq!(string_toui("").unwrap(), 0);
        for bad in ["4294967296", "-1", "12abc", "0x", "09", "abc", " "] {
            assert!(string_toui(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_check_pf() {
        let pf = Target {
            bdf: Bdf::new(0, 0xbd, 0, 3).unwrap(),
            dev_name: None,
        };
        assert!(pf.check_pf().is_ok());
        let vf = Target {
            bdf: Bdf::new(0, 0xbd, 1, 0).unwrap(),
            dev_name: None,
        };
        let err = vf.check_pf().unwrap_err();
        assert_eq!(err.to_string(), "VF does not support query!");
    }

    fn add_netdev(root: &Path, name: &str, pci: &str, driver: &str) {
        let pci_dir = root.join("devices/pci0000:bc").join(pci);
        std::fs::create_dir_all(&pci_dir).unwrap();
        std::fs::create_dir_all(root.join("bus/pci/drivers").join(driver)).unwrap();
        symlink(
            root.join("bus/pci/drivers").join(driver),
            pci_dir.join("driver"),
        )
        .unwrap();
        let net = root.join("class/net").join(name);
        std::fs::create_dir_all(&net).unwrap();
        symlink(&pci_dir, net.join("device")).unwrap();
    }

    fn cause(err: Error) -> String {
        match err {
            Error::UnknownDevice(Some(cause)) => cause.to_string(),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_resolve_interface_name() {
        let dir = tempfile::tempdir().unwrap();
        add_netdev(dir.path(), "eth0", "0000:bd:00.2", "hns3");
        add_netdev(dir.path(), "enp1s0", "0000:01:00.0", "igb");
        let resolver = TargetResolver::new(dir.path());

        let target = resolver.resolve("eth0").unwrap();
        assert_eq!(target.bdf, Bdf::new(0, 0xbd, 0, 2).unwrap());
        assert_eq!(target.dev_name.as_deref(), Some("eth0"));

        let err = resolver.resolve("enp1s0").unwrap_err();
        assert_eq!(err.to_string(), "unknown device!");
        assert_eq!(cause(err), "device name error or unsupported.");

        let err = resolver.resolve("eth9").unwrap_err();
        assert_eq!(cause(err), "device name error or unsupported.");

        let err = resolver.resolve("a-very-long-ifname").unwrap_err();
        assert_eq!(cause(err), "parameter of target name is too long.");
    }

    #[test]
    fn test_resolve_bdf_skips_sysfs() {
        let resolver = TargetResolver::new("/nonexistent");
        let target = resolver.resolve("7d:00.1").unwrap();
        assert_eq!(target.bdf.to_string(), "0000:7d:00.1");
        assert_eq!(target.dev_name, None);
    }
}
