//! Pack parsing and delta resolution.

use std::collections::HashMap;
use std::io::Read;

use flate2::bufread::ZlibDecoder;
use git_hash::hasher::Hasher;
use git_hash::{ObjectId, SHA1_LEN};
use git_object::{Object, ObjectType};
use tracing::{debug, trace};

use crate::delta::apply_delta;
use crate::entry::{parse_entry_header, DeltaBase};
use crate::{CancellationToken, PackError, PACK_HEADER_SIZE, PACK_SIGNATURE, PACK_VERSION};

/// Looks up delta bases that live outside the pack being read.
pub type BaseResolver<'r> = &'r dyn Fn(&ObjectId) -> Option<(ObjectType, Vec<u8>)>;

/// A fully resolved object taken from a pack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedObjectRecord {
    /// Offset of the entry header within the pack.
    pub offset: u64,
    pub obj_type: ObjectType,
    pub data: Vec<u8>,
    pub sha: ObjectId,
    /// CRC32 over the entry's header and compressed bytes.
    pub crc32: u32,
}

impl PackedObjectRecord {
    /// Decode the resolved bytes into a typed object.
    pub fn decode(&self) -> Result<Object, PackError> {
        Ok(Object::parse_content(self.obj_type, &self.data)?)
    }
}

/// Result of [`PackReader::parse_all`].
#[derive(Debug)]
pub struct ParsedPack {
    /// Objects in pack order.
    pub objects: Vec<PackedObjectRecord>,
    /// The pack's trailing SHA-1.
    pub checksum: ObjectId,
}

enum State {
    Resolved {
        obj_type: ObjectType,
        data: Vec<u8>,
        sha: ObjectId,
    },
    Pending {
        base: DeltaBase,
        delta: Vec<u8>,
    },
}

struct Slot {
    offset: u64,
    crc32: u32,
    state: State,
}

enum Outcome {
    Resolved,
    Blocked(ObjectId),
}

/// A borrowed view over pack bytes with a validated header.
pub struct PackReader<'a> {
    data: &'a [u8],
    count: u32,
}

impl<'a> PackReader<'a> {
    /// Check the `PACK` magic and version 2 and read the object count.
    pub fn new(data: &'a [u8]) -> Result<Self, PackError> {
        if data.len() < PACK_HEADER_SIZE {
            return Err(PackError::Format(format!(
                "{} bytes is too short for a pack header",
                data.len()
            )));
        }
        if &data[..4] != PACK_SIGNATURE {
            return Err(PackError::Format("missing PACK signature".into()));
        }
        let version = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        if version != PACK_VERSION {
            return Err(PackError::Format(format!("unsupported pack version {version}")));
        }
        let count = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);
        Ok(Self { data, count })
    }

    pub fn object_count(&self) -> u32 {
        self.count
    }

    /// Inflate the zlib stream starting at `start`, which must expand to
    /// exactly `size` bytes. Returns the bytes and the compressed length.
    fn inflate(&self, start: usize, size: usize, entry: u64) -> Result<(Vec<u8>, usize), PackError> {
        let input = self.data.get(start..).ok_or_else(|| PackError::Corrupt {
            offset: entry,
            reason: "entry data starts past end of pack".into(),
        })?;
        let mut decoder = ZlibDecoder::new(input);
        // The declared size is untrusted; a stream cannot plausibly inflate
        // beyond a few times the bytes left in the pack.
        let mut out = Vec::with_capacity(size.min(input.len().saturating_mul(4)));
        (&mut decoder)
            .take(size as u64 + 1)
            .read_to_end(&mut out)
            .map_err(|e| PackError::Corrupt {
                offset: entry,
                reason: format!("inflate failed: {e}"),
            })?;
        if out.len() != size {
            return Err(PackError::Corrupt {
                offset: entry,
                reason: if out.len() > size {
                    format!("inflates past the {size} bytes the header declared")
                } else {
                    format!("inflated {} bytes, header declared {size}", out.len())
                },
            });
        }
        Ok((out, decoder.total_in() as usize))
    }

    /// Parse every entry and resolve all deltas.
    ///
    /// Entries are read front to back; deltas are then resolved one at a
    /// time, walking OFS_DELTA chains with an explicit stack. REF_DELTA
    /// bases are looked up among already resolved entries first and only
    /// then through `resolver`. Any failure aborts the whole parse.
    pub fn parse_all(
        &self,
        resolver: BaseResolver<'_>,
        cancel: &CancellationToken,
    ) -> Result<ParsedPack, PackError> {
        let mut slots = Vec::with_capacity(self.count as usize);
        let mut by_offset = HashMap::with_capacity(self.count as usize);
        let mut by_sha = HashMap::with_capacity(self.count as usize);
        let mut pending = Vec::new();
        let mut pos = PACK_HEADER_SIZE;

        for _ in 0..self.count {
            cancel.check()?;
            let offset = pos as u64;
            let header = parse_entry_header(&self.data[pos..], offset)?;
            let (data, used) = self.inflate(pos + header.header_len, header.size, offset)?;
            let end = pos + header.header_len + used;
            let crc32 = crc32fast::hash(&self.data[pos..end]);

            let state = match (header.base, header.kind.object_type()) {
                (None, Some(obj_type)) => {
                    let sha = obj_type.hash(&data)?;
                    by_sha.insert(sha, slots.len());
                    State::Resolved { obj_type, data, sha }
                }
                (Some(base), _) => {
                    pending.push(slots.len());
                    State::Pending { base, delta: data }
                }
                (None, None) => {
                    return Err(PackError::Corrupt {
                        offset,
                        reason: "delta entry without a base".into(),
                    })
                }
            };
            trace!(offset, kind = ?header.kind, size = header.size, "pack entry");
            by_offset.insert(offset, slots.len());
            slots.push(Slot { offset, crc32, state });
            pos = end;
        }

        let checksum = self.verify_trailer(pos)?;
        debug!(objects = slots.len(), deltas = pending.len(), "pack entries read");

        let mut rounds = 0;
        while !pending.is_empty() {
            rounds += 1;
            let mut still_pending = Vec::new();
            for &i in &pending {
                cancel.check()?;
                if let Outcome::Blocked(_) = resolve(&mut slots, i, &by_offset, &mut by_sha, None)? {
                    still_pending.push(i);
                }
            }

            if still_pending.len() == pending.len() {
                // Every remaining delta waits on a base outside the pack.
                let mut first_missing = None;
                let mut remaining = Vec::new();
                for &i in &still_pending {
                    cancel.check()?;
                    match resolve(&mut slots, i, &by_offset, &mut by_sha, Some(resolver))? {
                        Outcome::Resolved => {}
                        Outcome::Blocked(sha) => {
                            first_missing.get_or_insert(sha);
                            remaining.push(i);
                        }
                    }
                }
                if remaining.len() == still_pending.len() {
                    if let Some(sha) = first_missing {
                        return Err(PackError::MissingBase(sha));
                    }
                }
                still_pending = remaining;
            }
            pending = still_pending;
        }
        debug!(rounds, "deltas resolved");

        let objects = slots
            .into_iter()
            .map(|slot| match slot.state {
                State::Resolved { obj_type, data, sha } => Ok(PackedObjectRecord {
                    offset: slot.offset,
                    obj_type,
                    data,
                    sha,
                    crc32: slot.crc32,
                }),
                State::Pending { .. } => Err(PackError::Corrupt {
                    offset: slot.offset,
                    reason: "delta left unresolved".into(),
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ParsedPack { objects, checksum })
    }

    fn verify_trailer(&self, end: usize) -> Result<ObjectId, PackError> {
        let trailer = self
            .data
            .get(end..end + SHA1_LEN)
            .ok_or_else(|| PackError::Format("missing pack trailer".into()))?;
        let expected = ObjectId::from_bytes(trailer)?;
        let actual = Hasher::digest(&self.data[..end])?;
        if expected != actual {
            return Err(PackError::ChecksumMismatch { expected, actual });
        }
        Ok(expected)
    }

    /// Expand the single object whose entry starts at `offset`.
    ///
    /// The delta chain is collected iteratively and applied base-first, so
    /// chain length never grows the call stack. `locate` maps a REF_DELTA
    /// base to an offset inside this pack; `resolver` covers bases stored
    /// elsewhere.
    pub fn expand_at_offset(
        &self,
        offset: u64,
        locate: &dyn Fn(&ObjectId) -> Option<u64>,
        resolver: BaseResolver<'_>,
    ) -> Result<(ObjectType, Vec<u8>), PackError> {
        let mut deltas: Vec<Vec<u8>> = Vec::new();
        let mut current = offset;

        let (obj_type, mut data) = loop {
            if deltas.len() > self.count as usize {
                return Err(PackError::Corrupt {
                    offset,
                    reason: "delta chain loops".into(),
                });
            }
            let start = usize::try_from(current)
                .ok()
                .filter(|&s| s < self.data.len())
                .ok_or_else(|| PackError::Corrupt {
                    offset: current,
                    reason: "offset beyond end of pack".into(),
                })?;
            let header = parse_entry_header(&self.data[start..], current)?;
            let (bytes, _) = self.inflate(start + header.header_len, header.size, current)?;

            match header.base {
                None => {
                    let obj_type = header.kind.object_type().ok_or_else(|| PackError::Corrupt {
                        offset: current,
                        reason: "delta entry without a base".into(),
                    })?;
                    break (obj_type, bytes);
                }
                Some(DeltaBase::Offset(base)) => {
                    deltas.push(bytes);
                    current = base;
                }
                Some(DeltaBase::Sha(sha)) => {
                    deltas.push(bytes);
                    if let Some(base) = locate(&sha) {
                        current = base;
                    } else if let Some(found) = resolver(&sha) {
                        break found;
                    } else {
                        return Err(PackError::MissingBase(sha));
                    }
                }
            }
        };

        for delta in deltas.iter().rev() {
            data = apply_delta(&data, delta)?;
        }
        Ok((obj_type, data))
    }
}

/// Resolve slot `i` and any same-pack bases it waits on.
fn resolve(
    slots: &mut [Slot],
    i: usize,
    by_offset: &HashMap<u64, usize>,
    by_sha: &mut HashMap<ObjectId, usize>,
    external: Option<BaseResolver<'_>>,
) -> Result<Outcome, PackError> {
    let mut stack = vec![i];

    while let Some(&top) = stack.last() {
        let base = match &slots[top].state {
            State::Resolved { .. } => {
                stack.pop();
                continue;
            }
            State::Pending { base, .. } => *base,
        };

        let resolved = match base {
            DeltaBase::Offset(off) => {
                let b = *by_offset.get(&off).ok_or_else(|| PackError::Corrupt {
                    offset: slots[top].offset,
                    reason: format!("no entry at delta base offset {off}"),
                })?;
                match &slots[b].state {
                    State::Resolved { obj_type, data, .. } => {
                        (*obj_type, expand(&slots[top].state, data)?)
                    }
                    State::Pending { .. } => {
                        stack.push(b);
                        continue;
                    }
                }
            }
            DeltaBase::Sha(sha) => {
                if let Some(&b) = by_sha.get(&sha) {
                    match &slots[b].state {
                        State::Resolved { obj_type, data, .. } => {
                            (*obj_type, expand(&slots[top].state, data)?)
                        }
                        State::Pending { .. } => return Ok(Outcome::Blocked(sha)),
                    }
                } else if let Some((obj_type, data)) = external.and_then(|r| r(&sha)) {
                    (obj_type, expand(&slots[top].state, &data)?)
                } else {
                    return Ok(Outcome::Blocked(sha));
                }
            }
        };

        let (obj_type, data) = resolved;
        let sha = obj_type.hash(&data)?;
        by_sha.insert(sha, top);
        slots[top].state = State::Resolved { obj_type, data, sha };
        stack.pop();
    }

    Ok(Outcome::Resolved)
}

fn expand(state: &State, base: &[u8]) -> Result<Vec<u8>, PackError> {
    match state {
        State::Pending { delta, .. } => apply_delta(base, delta),
        State::Resolved { data, .. } => Ok(data.clone()),
    }
}
