//! ### English
//! Hash map keyed by surface id. Ids are small sequential integers, so hashing them through
//! SipHash buys nothing; the id itself is the hash.
//!
//! ### 中文
//! 以 surface id 为 key 的 HashMap。id 是较小的连续整数，用 SipHash 哈希没有收益；
//! 直接以 id 本身作为哈希值。

use std::collections::HashMap;
use std::hash::{BuildHasherDefault, Hasher};

#[derive(Default)]
pub(super) struct SurfaceIdHasher(u64);

impl Hasher for SurfaceIdHasher {
    fn write(&mut self, bytes: &[u8]) {
        // Only reached for non-`u32` keys; fold the bytes so the map still works.
        for chunk in bytes.chunks(8) {
            let mut word = [0u8; 8];
            word[..chunk.len()].copy_from_slice(chunk);
            self.0 = self.0.rotate_left(5) ^ u64::from_le_bytes(word);
        }
    }

    fn write_u32(&mut self, id: u32) {
        self.0 = u64::from(id);
    }

    fn finish(&self) -> u64 {
        self.0
    }
}

/// ### English
/// `surface id -> V` map using the identity hasher.
///
/// ### 中文
/// 使用恒等哈希的 `surface id -> V` 映射。
pub(super) type SurfaceIdMap<V> = HashMap<u32, V, BuildHasherDefault<SurfaceIdHasher>>;

#[cfg(test)]
mod tests {
    use std::hash::BuildHasher;

    use super::*;

    #[test]
    fn ids_hash_to_themselves() {
        let build = BuildHasherDefault::<SurfaceIdHasher>::default();
        assert_eq!(build.hash_one(7u32), 7);

        let mut map = SurfaceIdMap::default();
        map.insert(1, "a");
        map.insert(2, "b");
        assert_eq!(map.get(&2), Some(&"b"));
    }
}
