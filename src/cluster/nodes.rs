use crate::{
    Error, Result,
    cluster::{SLOT_COUNT, hash_slot},
};
use log::debug;
use std::cmp::Ordering;

/// One cluster master parsed from a `nodes.conf`-compatible description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterNode {
    pub id: String,
    pub host: String,
    pub port: u16,
    pub slot_ranges: Vec<(u16, u16)>,
}

/// Parses a `nodes.conf`-compatible description.
///
/// Line format: `id host:port@cport flags master-id ping-sent pong-recv
/// epoch link-state slot-ranges…`. Only masters are retained; replicas and
/// handshake entries are skipped. Migrating/importing ranges (`[N-<-id]`,
/// `[N->-id]`) describe an unstable topology and are rejected when
/// `strict` is set, ignored otherwise.
pub fn parse_nodes(topology: &str, strict: bool) -> Result<Vec<ClusterNode>> {
    let mut nodes = Vec::new();

    for line in topology.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("vars ") {
            continue;
        }

        let mut fields = line.split_whitespace();
        let (
            Some(id),
            Some(addr),
            Some(flags),
            Some(_master_id),
            Some(_ping_sent),
            Some(_pong_recv),
            Some(_epoch),
            Some(_link_state),
        ) = (
            fields.next(),
            fields.next(),
            fields.next(),
            fields.next(),
            fields.next(),
            fields.next(),
            fields.next(),
            fields.next(),
        )
        else {
            return Err(Error::Config(format!("Malformed cluster node line: {line}")));
        };

        if !flags.split(',').any(|f| f == "master") {
            continue;
        }

        // host:port@cport; the cluster bus port is irrelevant here
        let addr = addr.split('@').next().unwrap_or(addr);
        let (host, port) = match addr.rsplit_once(':') {
            Some((host, port)) => match port.parse::<u16>() {
                Ok(port) => (host, port),
                Err(_) => {
                    return Err(Error::Config(format!("Malformed node address: {addr}")));
                }
            },
            None => {
                return Err(Error::Config(format!("Malformed node address: {addr}")));
            }
        };

        let mut slot_ranges = Vec::new();
        for token in fields {
            if token.starts_with('[') {
                if strict {
                    return Err(Error::Config(format!(
                        "Unstable slot (migrating or importing): {token}"
                    )));
                }
                continue;
            }

            let range = match token.split_once('-') {
                Some((lo, hi)) => match (lo.parse::<u16>(), hi.parse::<u16>()) {
                    (Ok(lo), Ok(hi)) if lo <= hi && hi < SLOT_COUNT => (lo, hi),
                    _ => {
                        return Err(Error::Config(format!("Malformed slot range: {token}")));
                    }
                },
                None => match token.parse::<u16>() {
                    Ok(slot) if slot < SLOT_COUNT => (slot, slot),
                    _ => {
                        return Err(Error::Config(format!("Malformed slot range: {token}")));
                    }
                },
            };
            slot_ranges.push(range);
        }

        nodes.push(ClusterNode {
            id: id.to_owned(),
            host: host.to_owned(),
            port,
            slot_ranges,
        });
    }

    Ok(nodes)
}

/// A total mapping from slot to owning master.
///
/// Built once at startup and shared read-only across workers.
#[derive(Debug)]
pub struct SlotMap {
    nodes: Vec<ClusterNode>,
    /// `(lo, hi, node index)` sorted by `lo`, covering `[0, 16384)`
    ranges: Vec<(u16, u16, usize)>,
}

impl SlotMap {
    /// Validates that every slot is covered exactly once; overlaps or gaps
    /// are a fatal configuration error.
    pub fn build(nodes: Vec<ClusterNode>) -> Result<Self> {
        let mut ranges = Vec::new();
        for (index, node) in nodes.iter().enumerate() {
            for (lo, hi) in &node.slot_ranges {
                ranges.push((*lo, *hi, index));
            }
        }
        ranges.sort_unstable();

        let mut next_slot = 0u32;
        for (lo, hi, _) in &ranges {
            match (*lo as u32).cmp(&next_slot) {
                Ordering::Less => {
                    return Err(Error::Config(format!(
                        "Overlapping slot ranges around slot {lo}"
                    )));
                }
                Ordering::Greater => {
                    return Err(Error::Config(format!(
                        "Uncovered slots {next_slot}-{}",
                        lo - 1
                    )));
                }
                Ordering::Equal => next_slot = *hi as u32 + 1,
            }
        }

        if next_slot != SLOT_COUNT as u32 {
            return Err(Error::Config(format!(
                "Uncovered slots {next_slot}-{}",
                SLOT_COUNT - 1
            )));
        }

        debug!("Slot map built over {} masters", nodes.len());

        Ok(Self { nodes, ranges })
    }

    /// Parses and validates a `nodes.conf`-compatible description in one go.
    pub fn from_topology(topology: &str) -> Result<Self> {
        Self::build(parse_nodes(topology, true)?)
    }

    pub fn nodes(&self) -> &[ClusterNode] {
        &self.nodes
    }

    /// Index into [`nodes`](SlotMap::nodes) of the master owning `slot`.
    pub fn owner_of_slot(&self, slot: u16) -> usize {
        let index = self
            .ranges
            .binary_search_by(|(lo, hi, _)| {
                if *lo > slot {
                    Ordering::Greater
                } else if *hi < slot {
                    Ordering::Less
                } else {
                    Ordering::Equal
                }
            })
            .expect("slot map covers every slot");

        self.ranges[index].2
    }

    /// Index of the master owning `key`.
    pub fn owner_of(&self, key: &[u8]) -> usize {
        self.owner_of_slot(hash_slot(key))
    }
}
