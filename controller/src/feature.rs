// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! Tables of the sub-views a command can dump.

use crate::Error;

/// One selectable view of a command, such as `nic_ppp -du mac`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Feature<K> {
    /// The name given on the command line.
    pub name: &'static str,
    /// The sub-command code sent to firmware.
    pub sub_cmd: u32,
    /// Whether the hardware specifications must be fetched first.
    pub prequery: bool,
    /// What the command does for this view.
    pub kind: K,
}

/// Find the feature called exactly `name`.
pub fn lookup<K: Copy>(table: &[Feature<K>], name: &str) -> Option<Feature<K>> {
    table.iter().find(|f| f.name == name).copied()
}

/// Find the feature called exactly `name`, or fail with `usage`.
///
/// The error is reported after the command's help.
pub fn select<K: Copy>(
    table: &[Feature<K>],
    name: Option<&str>,
    usage: &str,
) -> Result<Feature<K>, Error> {
    name.and_then(|name| lookup(table, name))
        .ok_or_else(|| Error::Usage(String::from(usage)))
}

#[cfg(test)]
mod tests {
    use super::lookup;
    use super::select;
    use super::Feature;
    use crate::options::OptionRegistry;
    use crate::options::Outcome;
    use crate::Error;

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    enum View {
        Mac,
        Vlan,
    }

    const TABLE: &[Feature<View>] = &[
        Feature {
            name: "mac",
            sub_cmd: 1,
            prequery: true,
            kind: View::Mac,
        },
        Feature {
            name: "vlan",
            sub_cmd: 2,
            prequery: true,
            kind: View::Vlan,
        },
    ];

    #[derive(Debug, Default)]
    struct Ctx {
        feature: Option<Feature<View>>,
    }

    fn dump(ctx: &mut Ctx, arg: Option<&str>) -> Result<(), Error> {
        ctx.feature = Some(select(TABLE, arg, "please input valid subfunction.")?);
        Ok(())
    }

    #[test]
    fn test_lookup_is_exact() {
        assert_eq!(lookup(TABLE, "mac").map(|f| f.kind), Some(View::Mac));
        assert_eq!(lookup(TABLE, "vlan").map(|f| f.sub_cmd), Some(2));
        assert!(lookup(TABLE, "ma").is_none());
        assert!(lookup(TABLE, "macs").is_none());
        assert!(lookup(TABLE, "MAC").is_none());
    }

    #[test]
    fn test_dump_selects_feature() {
        let mut reg = OptionRegistry::new(crate::mock::test_logger());
        reg.register_help();
        reg.register("-du", "--dump", true, dump);

        let mut ctx = Ctx::default();
        assert_eq!(reg.parse(&mut ctx, &["-du", "mac"]).unwrap(), Outcome::Continue);
        assert_eq!(ctx.feature, Some(TABLE[0]));

        let mut ctx = Ctx::default();
        let err = reg.parse(&mut ctx, &["-du", "unknown"]).unwrap_err();
        assert!(matches!(&err, Error::Usage(msg) if msg == "please input valid subfunction."));
        assert!(ctx.feature.is_none());
    }
}
