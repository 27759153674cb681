//! Lookup order: loose, then packs in load order.
//!
//! REF_DELTA bases a pack does not hold itself are looked up in loose
//! storage and then in the other packs.

use std::sync::PoisonError;

use git_hash::ObjectId;
use git_object::ObjectType;
use git_pack::PackFile;

use crate::{ObjectStore, OdbError, RawObject};

pub(crate) fn find_object(store: &ObjectStore, oid: &ObjectId) -> Result<Option<RawObject>, OdbError> {
    if let Some((obj_type, data)) = store.loose.read(oid)? {
        return Ok(Some(RawObject { obj_type, data }));
    }

    let packs = store.packs.read().unwrap_or_else(PoisonError::into_inner);
    for (i, pack) in packs.iter().enumerate() {
        if !pack.contains(oid) {
            continue;
        }
        let resolver = |base: &ObjectId| external_base(store, &packs, i, base);
        if let Some((obj_type, data)) = pack.read_object(oid, &resolver)? {
            return Ok(Some(RawObject { obj_type, data }));
        }
    }
    Ok(None)
}

fn external_base(
    store: &ObjectStore,
    packs: &[PackFile],
    skip: usize,
    base: &ObjectId,
) -> Option<(ObjectType, Vec<u8>)> {
    if let Ok(Some(found)) = store.loose.read(base) {
        return Some(found);
    }
    let none = |_: &ObjectId| -> Option<(ObjectType, Vec<u8>)> { None };
    packs
        .iter()
        .enumerate()
        .filter(|(j, _)| *j != skip)
        .find_map(|(_, other)| other.read_object(base, &none).ok().flatten())
}
