/*!
Cluster slot routing.

[`hash_slot`] maps a key to one of the 16,384 slots partitioning a Redis
cluster keyspace; [`SlotMap`] maps every slot to its owning master, built
from a `nodes.conf`-compatible topology description and validated for
full, non-overlapping coverage.
*/
mod nodes;
mod slot;

pub use nodes::*;
pub use slot::*;
