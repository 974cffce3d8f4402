use std::collections::HashSet;

use crate::{
    common::{Buffer, NanoemError},
    mutable::common::MutableBuffer,
};

use super::object::{find_by_handle, Handle, Identified, ObjectId};

pub const DEFAULT_INTERPOLATION: [u8; 4] = [20u8, 20u8, 107u8, 107u8];

#[derive(Debug)]
pub struct DocumentBaseKeyframe {
    pub object_index: i32,
    pub frame_index: u32,
    pub previous_keyframe_index: i32,
    pub next_keyframe_index: i32,
    pub is_selected: bool,
    id: ObjectId,
}

impl Default for DocumentBaseKeyframe {
    fn default() -> Self {
        Self {
            object_index: 0,
            frame_index: 0,
            previous_keyframe_index: 0,
            next_keyframe_index: 0,
            is_selected: false,
            id: ObjectId::next(),
        }
    }
}

impl Clone for DocumentBaseKeyframe {
    fn clone(&self) -> Self {
        Self {
            object_index: self.object_index,
            frame_index: self.frame_index,
            previous_keyframe_index: self.previous_keyframe_index,
            next_keyframe_index: self.next_keyframe_index,
            is_selected: self.is_selected,
            id: ObjectId::next(),
        }
    }
}

impl PartialEq for DocumentBaseKeyframe {
    fn eq(&self, other: &Self) -> bool {
        self.object_index == other.object_index
            && self.frame_index == other.frame_index
            && self.previous_keyframe_index == other.previous_keyframe_index
            && self.next_keyframe_index == other.next_keyframe_index
            && self.is_selected == other.is_selected
    }
}

impl DocumentBaseKeyframe {
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Initial keyframes do not store their object index, it is their ordinal.
    pub fn parse(buffer: &mut Buffer, include_index: bool) -> Result<Self, NanoemError> {
        let object_index = if include_index {
            buffer.read_i32_little_endian()?
        } else {
            0
        };
        Ok(Self {
            object_index,
            frame_index: buffer.read_u32_little_endian()?,
            previous_keyframe_index: buffer.read_i32_little_endian()?,
            next_keyframe_index: buffer.read_i32_little_endian()?,
            is_selected: false,
            id: ObjectId::next(),
        })
    }

    pub fn save(&self, buffer: &mut MutableBuffer, include_index: bool) -> Result<(), NanoemError> {
        if include_index {
            buffer.write_i32_little_endian(self.object_index)?;
        }
        buffer.write_u32_little_endian(self.frame_index)?;
        buffer.write_i32_little_endian(self.previous_keyframe_index)?;
        buffer.write_i32_little_endian(self.next_keyframe_index)
    }

    pub fn reset(&mut self) {
        self.object_index = 0;
        self.frame_index = 0;
        self.previous_keyframe_index = 0;
        self.next_keyframe_index = 0;
        self.is_selected = false;
    }

    /// Assigns own position and own links. Neighbours are left untouched.
    pub fn set(
        &mut self,
        frame_index: u32,
        object_index: i32,
        previous: &KeyframeCompareResult,
        next: &KeyframeCompareResult,
    ) {
        self.frame_index = frame_index;
        self.object_index = object_index;
        if previous.keyframe.is_some() {
            self.previous_keyframe_index = previous.index;
        }
        if next.keyframe.is_some() {
            self.next_keyframe_index = next.index;
        }
    }

    /// Returns true on an exact hit, otherwise records the candidate when it is strictly closer.
    pub fn compare(
        &self,
        slot: KeyframeSlot,
        frame_index: u32,
        previous: &mut KeyframeCompareResult,
        next: &mut KeyframeCompareResult,
    ) -> bool {
        let current_frame_index = self.frame_index;
        if current_frame_index > frame_index {
            let delta = current_frame_index - frame_index;
            if delta < next.delta {
                next.keyframe = Some(slot);
                next.index = self.object_index;
                next.delta = delta;
            }
            false
        } else if current_frame_index < frame_index {
            let delta = frame_index - current_frame_index;
            if delta < previous.delta {
                previous.keyframe = Some(slot);
                previous.index = self.object_index;
                previous.delta = delta;
            }
            false
        } else {
            true
        }
    }
}

pub fn parse_interpolation(buffer: &mut Buffer) -> Result<[u8; 4], NanoemError> {
    Ok([
        buffer.read_byte()?,
        buffer.read_byte()?,
        buffer.read_byte()?,
        buffer.read_byte()?,
    ])
}

/// Location of a keyframe inside the initial + timeline pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyframeSlot {
    Initial(usize),
    Timeline(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyframeCompareResult {
    pub keyframe: Option<KeyframeSlot>,
    pub index: i32,
    pub delta: u32,
}

impl Default for KeyframeCompareResult {
    fn default() -> Self {
        Self {
            keyframe: None,
            index: 0,
            delta: u32::MAX,
        }
    }
}

impl KeyframeCompareResult {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

pub trait DocumentKeyframe: Identified {
    fn base(&self) -> &DocumentBaseKeyframe;
    fn base_mut(&mut self) -> &mut DocumentBaseKeyframe;

    fn frame_index(&self) -> u32 {
        self.base().frame_index
    }
}

#[macro_export]
macro_rules! impl_document_keyframe {
    ($typ: ty) => {
        impl $crate::document::object::Identified for $typ {
            fn handle_index(&self) -> i32 {
                self.base.object_index
            }

            fn object_id(&self) -> $crate::document::object::ObjectId {
                self.base.id()
            }
        }

        impl $crate::document::keyframe::DocumentKeyframe for $typ {
            fn base(&self) -> &$crate::document::keyframe::DocumentBaseKeyframe {
                &self.base
            }

            fn base_mut(&mut self) -> &mut $crate::document::keyframe::DocumentBaseKeyframe {
                &mut self.base
            }
        }
    };
}

/// Timeline position of the keyframe whose object index is `object_index`.
pub fn find_timeline_position<K: DocumentKeyframe>(
    num_initial: usize,
    timeline: &[K],
    object_index: i32,
) -> Option<usize> {
    let guess = usize::try_from(object_index)
        .ok()
        .and_then(|index| index.checked_sub(num_initial));
    if let Some(pos) = guess {
        if timeline
            .get(pos)
            .map_or(false, |keyframe| keyframe.base().object_index == object_index)
        {
            return Some(pos);
        }
    }
    timeline
        .iter()
        .position(|keyframe| keyframe.base().object_index == object_index)
}

/// Walks the previous links back to an initial keyframe and returns its ordinal.
pub fn resolve_ordinal<K: DocumentKeyframe>(
    initial: &[K],
    timeline: &[K],
    keyframe: &K,
) -> Option<usize> {
    if let Some(ordinal) = initial
        .iter()
        .position(|initial_keyframe| initial_keyframe.object_id() == keyframe.object_id())
    {
        return Some(ordinal);
    }
    let mut visited = HashSet::new();
    let mut current = keyframe.base();
    loop {
        if !visited.insert(current.frame_index) {
            return None;
        }
        let previous = usize::try_from(current.previous_keyframe_index).ok()?;
        if let Some(initial_keyframe) = initial.get(previous) {
            return usize::try_from(initial_keyframe.base().object_index).ok();
        }
        let pos = find_timeline_position(initial.len(), timeline, current.previous_keyframe_index)?;
        current = timeline[pos].base();
    }
}

/// Follows the next link. Links into the initial range terminate the chain.
pub fn next_keyframe<'a, K: DocumentKeyframe>(
    initial: &'a [K],
    timeline: &'a [K],
    keyframe: &K,
) -> Option<&'a K> {
    let next = keyframe.base().next_keyframe_index;
    if next < 0 || (next as usize) < initial.len() {
        return None;
    }
    find_timeline_position(initial.len(), timeline, next).map(|pos| &timeline[pos])
}

/// Ordinals of every timeline keyframe in one pass. Each chain is walked once and the
/// result is shared by every keyframe on it.
pub fn resolve_ordinals<K: DocumentKeyframe>(
    initial: &[K],
    timeline: &[K],
) -> Vec<Option<usize>> {
    let mut resolved: Vec<Option<Option<usize>>> = vec![None; timeline.len()];
    let mut on_path = vec![false; timeline.len()];
    let mut path = vec![];
    for start in 0..timeline.len() {
        let mut current = start;
        let ordinal = loop {
            if let Some(ordinal) = resolved[current] {
                break ordinal;
            }
            if on_path[current] {
                break None;
            }
            on_path[current] = true;
            path.push(current);
            let previous = timeline[current].base().previous_keyframe_index;
            match usize::try_from(previous) {
                Ok(pos) if pos < initial.len() => {
                    break usize::try_from(initial[pos].base().object_index).ok();
                }
                Ok(_) => match find_timeline_position(initial.len(), timeline, previous) {
                    Some(pos) => current = pos,
                    None => break None,
                },
                Err(_) => break None,
            }
        };
        for pos in path.drain(..) {
            on_path[pos] = false;
            resolved[pos] = Some(ordinal);
        }
    }
    resolved.into_iter().map(Option::flatten).collect()
}

fn candidate_slots<K: DocumentKeyframe>(
    initial: &[K],
    timeline: &[K],
    ordinal: Option<usize>,
) -> Vec<KeyframeSlot> {
    match ordinal {
        Some(ordinal) => {
            let mut slots = vec![KeyframeSlot::Initial(ordinal)];
            slots.extend(
                resolve_ordinals(initial, timeline)
                    .into_iter()
                    .enumerate()
                    .filter(|(_, resolved)| *resolved == Some(ordinal))
                    .map(|(pos, _)| KeyframeSlot::Timeline(pos)),
            );
            slots
        }
        None => (0..initial.len())
            .map(KeyframeSlot::Initial)
            .chain((0..timeline.len()).map(KeyframeSlot::Timeline))
            .collect(),
    }
}

fn slot_get<'a, K>(initial: &'a [K], timeline: &'a [K], slot: KeyframeSlot) -> Option<&'a K> {
    match slot {
        KeyframeSlot::Initial(pos) => initial.get(pos),
        KeyframeSlot::Timeline(pos) => timeline.get(pos),
    }
}

/// Scans the candidate keyframes in array order. `None` means an exact hit on `frame_index`.
pub fn compare_all<K: DocumentKeyframe>(
    initial: &[K],
    timeline: &[K],
    frame_index: u32,
    ordinal: Option<usize>,
) -> Option<(KeyframeCompareResult, KeyframeCompareResult)> {
    let mut previous = KeyframeCompareResult::default();
    let mut next = KeyframeCompareResult::default();
    for slot in candidate_slots(initial, timeline, ordinal) {
        if let Some(keyframe) = slot_get(initial, timeline, slot) {
            if keyframe
                .base()
                .compare(slot, frame_index, &mut previous, &mut next)
            {
                return None;
            }
        }
    }
    Some((previous, next))
}

/// Nearest keyframes strictly before and strictly after `frame_index`.
pub fn search_closest<'a, K: DocumentKeyframe>(
    initial: &'a [K],
    timeline: &'a [K],
    frame_index: u32,
    ordinal: Option<usize>,
) -> (Option<&'a K>, Option<&'a K>) {
    let mut previous = KeyframeCompareResult::default();
    let mut next = KeyframeCompareResult::default();
    for slot in candidate_slots(initial, timeline, ordinal) {
        if let Some(keyframe) = slot_get(initial, timeline, slot) {
            keyframe
                .base()
                .compare(slot, frame_index, &mut previous, &mut next);
        }
    }
    (
        previous
            .keyframe
            .and_then(|slot| slot_get(initial, timeline, slot)),
        next.keyframe.and_then(|slot| slot_get(initial, timeline, slot)),
    )
}

/// Mutable view over one keyframe family: the initial keyframes followed by the timeline.
pub struct KeyframeTrack<'k, K> {
    initial: &'k mut [K],
    timeline: &'k mut Vec<K>,
}

impl<'k, K: DocumentKeyframe> KeyframeTrack<'k, K> {
    pub fn new(initial: &'k mut [K], timeline: &'k mut Vec<K>) -> Self {
        Self { initial, timeline }
    }

    fn get_mut(&mut self, slot: KeyframeSlot) -> Option<&mut K> {
        match slot {
            KeyframeSlot::Initial(pos) => self.initial.get_mut(pos),
            KeyframeSlot::Timeline(pos) => self.timeline.get_mut(pos),
        }
    }

    /// Points the neighbours recorded in `previous` and `next` at `object_index`.
    pub fn link_neighbors(
        &mut self,
        previous: &KeyframeCompareResult,
        next: &KeyframeCompareResult,
        object_index: i32,
    ) {
        if let Some(keyframe) = previous.keyframe.and_then(|slot| self.get_mut(slot)) {
            keyframe.base_mut().next_keyframe_index = object_index;
        }
        if let Some(keyframe) = next.keyframe.and_then(|slot| self.get_mut(slot)) {
            keyframe.base_mut().previous_keyframe_index = object_index;
        }
    }

    /// Both halves of the doubly linked splice for the timeline keyframe at `pos`.
    fn splice_keyframe(
        &mut self,
        pos: usize,
        frame_index: u32,
        previous: &KeyframeCompareResult,
        next: &KeyframeCompareResult,
    ) -> i32 {
        let object_index = (self.initial.len() + pos) as i32;
        if let Some(keyframe) = self.timeline.get_mut(pos) {
            keyframe
                .base_mut()
                .set(frame_index, object_index, previous, next);
        }
        self.link_neighbors(previous, next, object_index);
        object_index
    }

    /// Appends `keyframe` to the timeline and splices it between its frame order neighbours.
    /// `ordinal` restricts the neighbour search to one bone or morph.
    pub fn insert(
        &mut self,
        mut keyframe: K,
        frame_index: u32,
        ordinal: Option<usize>,
        already_exists: NanoemError,
    ) -> Result<Handle<K>, NanoemError> {
        let (previous, next) = compare_all(self.initial, self.timeline, frame_index, ordinal)
            .ok_or(already_exists)?;
        let base = keyframe.base_mut();
        base.previous_keyframe_index = 0;
        base.next_keyframe_index = 0;
        self.timeline.push(keyframe);
        let pos = self.timeline.len() - 1;
        self.splice_keyframe(pos, frame_index, &previous, &next);
        Ok(self.timeline[pos].handle())
    }

    /// Detaches a timeline keyframe and joins its former neighbours.
    ///
    /// Links are renumbered along with the compacted object indices so none of them
    /// ends up pointing at a different keyframe.
    pub fn remove(&mut self, handle: Handle<K>, not_found: NanoemError) -> Result<K, NanoemError> {
        let pos = find_by_handle(self.timeline, handle).ok_or(not_found)?;
        let mut keyframe = self.timeline.remove(pos);
        let removed = keyframe.base();
        let (removed_index, previous, next) = (
            removed.object_index,
            removed.previous_keyframe_index,
            removed.next_keyframe_index,
        );
        let renumber = |index: i32| {
            if index > removed_index {
                index - 1
            } else {
                index
            }
        };
        for rest in self.initial.iter_mut().chain(self.timeline.iter_mut()) {
            let base = rest.base_mut();
            if base.previous_keyframe_index == removed_index {
                base.previous_keyframe_index = previous;
            }
            if base.next_keyframe_index == removed_index {
                base.next_keyframe_index = next;
            }
            base.previous_keyframe_index = renumber(base.previous_keyframe_index);
            base.next_keyframe_index = renumber(base.next_keyframe_index);
        }
        for rest in self.timeline[pos..].iter_mut() {
            rest.base_mut().object_index -= 1;
        }
        keyframe.base_mut().reset();
        Ok(keyframe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default)]
    struct TestKeyframe {
        base: DocumentBaseKeyframe,
    }

    crate::impl_document_keyframe!(TestKeyframe);

    fn keyframe_at(frame_index: u32, object_index: i32) -> TestKeyframe {
        let mut keyframe = TestKeyframe::default();
        keyframe.base.frame_index = frame_index;
        keyframe.base.object_index = object_index;
        keyframe
    }

    #[test]
    fn test_compare_first_found_wins_on_tie() {
        let a = keyframe_at(10, 1);
        let b = keyframe_at(30, 2);
        let c = keyframe_at(10, 3);
        let mut previous = KeyframeCompareResult::default();
        let mut next = KeyframeCompareResult::default();
        assert!(!a.base.compare(KeyframeSlot::Timeline(0), 20, &mut previous, &mut next));
        assert!(!b.base.compare(KeyframeSlot::Timeline(1), 20, &mut previous, &mut next));
        assert!(!c.base.compare(KeyframeSlot::Timeline(2), 20, &mut previous, &mut next));
        assert_eq!(Some(KeyframeSlot::Timeline(0)), previous.keyframe);
        assert_eq!(1, previous.index);
        assert_eq!(10, previous.delta);
        assert_eq!(Some(KeyframeSlot::Timeline(1)), next.keyframe);
        assert_eq!(2, next.index);
        assert!(c.base.compare(KeyframeSlot::Timeline(2), 10, &mut previous, &mut next));
    }

    #[test]
    fn test_set_only_assigns_matched_links() {
        let mut keyframe = keyframe_at(0, 0);
        keyframe.base.next_keyframe_index = 7;
        let previous = KeyframeCompareResult {
            keyframe: Some(KeyframeSlot::Initial(0)),
            index: 4,
            delta: 3,
        };
        keyframe
            .base
            .set(12, 9, &previous, &KeyframeCompareResult::default());
        assert_eq!(12, keyframe.base.frame_index);
        assert_eq!(9, keyframe.base.object_index);
        assert_eq!(4, keyframe.base.previous_keyframe_index);
        assert_eq!(7, keyframe.base.next_keyframe_index);
    }

    #[test]
    fn test_reset_zeroes_fields() {
        let mut keyframe = keyframe_at(5, 3);
        keyframe.base.previous_keyframe_index = 2;
        keyframe.base.next_keyframe_index = 4;
        keyframe.base.is_selected = true;
        let id = keyframe.base.id();
        keyframe.base.reset();
        assert_eq!(keyframe_at(0, 0).base, keyframe.base);
        assert_eq!(id, keyframe.base.id());
    }

    #[test]
    fn test_insert_links_in_frame_order() {
        let mut initial = vec![keyframe_at(0, 0)];
        let mut timeline = vec![];
        let mut track = KeyframeTrack::new(&mut initial, &mut timeline);
        let error = NanoemError::DocumentCameraKeyframeAlreadyExists;
        track
            .insert(TestKeyframe::default(), 10, None, error.clone())
            .unwrap();
        track
            .insert(TestKeyframe::default(), 30, None, error.clone())
            .unwrap();
        track
            .insert(TestKeyframe::default(), 20, None, error.clone())
            .unwrap();
        assert_eq!(
            Err(error.clone()),
            track.insert(TestKeyframe::default(), 20, None, error)
        );
        let mut frames = vec![];
        let mut current = next_keyframe(&initial, &timeline, &initial[0]);
        while let Some(keyframe) = current {
            frames.push(keyframe.frame_index());
            current = next_keyframe(&initial, &timeline, keyframe);
        }
        assert_eq!(vec![10, 20, 30], frames);
        let (previous, next) = search_closest(&initial, &timeline, 25, None);
        assert_eq!(Some(20), previous.map(|k| k.frame_index()));
        assert_eq!(Some(30), next.map(|k| k.frame_index()));
    }

    #[test]
    fn test_resolve_ordinal_guards_cycles() {
        let initial = vec![keyframe_at(0, 0)];
        let mut a = keyframe_at(10, 1);
        let mut b = keyframe_at(10, 2);
        a.base.previous_keyframe_index = 2;
        b.base.previous_keyframe_index = 1;
        let timeline = vec![a, b];
        assert_eq!(None, resolve_ordinal(&initial, &timeline, &timeline[0]));
    }

    #[test]
    fn test_remove_compacts_object_indices() {
        let mut initial = vec![keyframe_at(0, 0)];
        let mut timeline = vec![];
        let mut track = KeyframeTrack::new(&mut initial, &mut timeline);
        let error = NanoemError::DocumentLightKeyframeNotFound;
        let first = track
            .insert(TestKeyframe::default(), 10, None, error.clone())
            .unwrap();
        track
            .insert(TestKeyframe::default(), 20, None, error.clone())
            .unwrap();
        let removed = track.remove(first, error.clone()).unwrap();
        assert_eq!(0, removed.base.frame_index);
        assert_eq!(Err(error.clone()), track.remove(first, error).map(|_| ()));
        assert_eq!(1, timeline.len());
        assert_eq!(1, timeline[0].base.object_index);
        assert_eq!(0, timeline[0].base.previous_keyframe_index);
        assert_eq!(1, initial[0].base.next_keyframe_index);
    }

    #[test]
    fn test_remove_joins_neighbours() {
        let mut initial = vec![keyframe_at(0, 0)];
        let mut timeline = vec![];
        let mut track = KeyframeTrack::new(&mut initial, &mut timeline);
        let error = NanoemError::DocumentCameraKeyframeNotFound;
        track
            .insert(TestKeyframe::default(), 30, None, error.clone())
            .unwrap();
        let middle = track
            .insert(TestKeyframe::default(), 20, None, error.clone())
            .unwrap();
        track
            .insert(TestKeyframe::default(), 40, None, error.clone())
            .unwrap();
        track
            .insert(TestKeyframe::default(), 10, None, error.clone())
            .unwrap();
        track.remove(middle, error).unwrap();
        let mut frames = vec![];
        let mut current = next_keyframe(&initial, &timeline, &initial[0]);
        while let Some(keyframe) = current {
            frames.push(keyframe.frame_index());
            current = next_keyframe(&initial, &timeline, keyframe);
        }
        assert_eq!(vec![10, 30, 40], frames);
        let ordinals = resolve_ordinals(&initial, &timeline);
        assert_eq!(vec![Some(0); 3], ordinals);
    }

    #[test]
    fn test_resolve_ordinals_matches_single_walk() {
        let initial = vec![keyframe_at(0, 0), keyframe_at(0, 1)];
        let mut a = keyframe_at(10, 2);
        a.base.previous_keyframe_index = 1;
        let mut b = keyframe_at(20, 3);
        b.base.previous_keyframe_index = 2;
        let mut c = keyframe_at(5, 4);
        c.base.previous_keyframe_index = 0;
        let mut d = keyframe_at(7, 5);
        d.base.previous_keyframe_index = 6;
        let mut e = keyframe_at(8, 6);
        e.base.previous_keyframe_index = 5;
        let timeline = vec![b, a, c, d, e];
        let ordinals = resolve_ordinals(&initial, &timeline);
        assert_eq!(vec![Some(1), Some(1), Some(0), None, None], ordinals);
        for (keyframe, ordinal) in timeline.iter().zip(ordinals) {
            assert_eq!(ordinal, resolve_ordinal(&initial, &timeline, keyframe));
        }
    }
}
