//spreads writers over the leaves of a shard tree, eg: shard_count 100 and ratio 5 gives the layer
//widths [100, 20, 4], so a leaf looks like "hits:57:11:2", its parent "hits:11:2", then "hits:2",
//then the root "hits". Every segment is derived from the leaf bucket (bucket / ratio^i), so two
//leaves that share a parent also share every ancestor above it.

use crate::address::ShardAddress;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardLayout {
    pub shard_count: u64,
    pub shard_ratio: u64,
}

impl ShardLayout {
    pub fn new(shard_count: u64, shard_ratio: u64) -> Self {
        ShardLayout {
            shard_count,
            //a ratio of 1 would never shrink the layers
            shard_ratio: shard_ratio.max(2),
        }
    }

    //leaf layer first
    pub fn layers(&self) -> Vec<u64> {
        let mut layers = Vec::new();
        let mut width = self.shard_count;
        while width > 1 {
            layers.push(width);
            width /= self.shard_ratio;
        }
        layers
    }

    pub fn leaf_for(&self, base: &str, token: &str) -> Result<ShardAddress, crate::AddressError> {
        let layers = self.layers();
        if layers.is_empty() {
            return ShardAddress::new(base);
        }

        let bucket = fnv1a(token.as_bytes()) % layers[0];
        let mut address = base.to_string();
        let mut divisor = 1u64;
        for _ in &layers {
            address.push(':');
            address.push_str(&(bucket / divisor).to_string());
            divisor = divisor.saturating_mul(self.shard_ratio);
        }
        ShardAddress::new(address)
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, b| {
        (hash ^ u64::from(*b)).wrapping_mul(FNV_PRIME)
    })
}
