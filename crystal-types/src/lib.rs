pub mod address;
pub mod g_counter;
pub mod layout;
pub mod lww_register;

pub use address::{parent_of, parse_shard_path, AddressError, PathDetails, ShardAddress};
pub use g_counter::{GCounter, GCounterSet};
pub use layout::ShardLayout;
pub use lww_register::{LwwRegister, PairSet};

//writer ids are shard addresses, but kept as a plain alias like the rest of the crate
pub type NodeId = String;

//`self` is the first argument of the merge, `other` the second
pub trait Merge {
    fn merge(&mut self, other: &Self);
}

//non-mutating form of Merge::merge, handy for the algebraic checks
pub fn merged<T: Merge + Clone>(a: &T, b: &T) -> T {
    let mut out = a.clone();
    out.merge(b);
    out
}
