/// Outcome of mapping a single position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapResult {
    pub pos: usize,
    /// The content on the side `assoc` points to was deleted.
    pub deleted: bool,
    pub deleted_before: bool,
    pub deleted_after: bool,
    /// The position sat strictly inside a replaced range.
    pub deleted_across: bool,
}

/// Anything positions can be mapped through.
pub trait Mappable {
    fn map(&self, pos: usize, assoc: i8) -> usize;
    fn map_result(&self, pos: usize, assoc: i8) -> MapResult;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MapRange {
    start: usize,
    old_size: usize,
    new_size: usize,
}

/// The position changes made by one step: a list of replaced ranges in
/// document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepMap {
    ranges: Vec<MapRange>,
    inverted: bool,
}

impl StepMap {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(ranges: impl IntoIterator<Item = (usize, usize, usize)>) -> Self {
        Self {
            ranges: ranges
                .into_iter()
                .filter(|&(_, old, new)| old != 0 || new != 0)
                .map(|(start, old_size, new_size)| MapRange {
                    start,
                    old_size,
                    new_size,
                })
                .collect(),
            inverted: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn invert(&self) -> StepMap {
        StepMap {
            ranges: self.ranges.clone(),
            inverted: !self.inverted,
        }
    }

    /// `assoc < 0` keeps a position at an insertion point before the inserted
    /// content, otherwise it moves after it.
    pub fn map(&self, pos: usize, assoc: i8) -> usize {
        self.map_result(pos, assoc).pos
    }

    pub fn map_result(&self, pos: usize, assoc: i8) -> MapResult {
        let mut diff: isize = 0;
        for range in &self.ranges {
            let (old_size, new_size) = if self.inverted {
                (range.new_size, range.old_size)
            } else {
                (range.old_size, range.new_size)
            };
            let start = if self.inverted {
                offset(range.start, -diff)
            } else {
                range.start
            };
            if start > pos {
                break;
            }
            let end = start + old_size;
            if pos <= end {
                let side = if old_size == 0 {
                    assoc
                } else if pos == start {
                    -1
                } else if pos == end {
                    1
                } else {
                    assoc
                };
                let result = offset(start, diff) + if side < 0 { 0 } else { new_size };
                let deleted_after = pos == start && old_size > 0 || pos > start && pos < end;
                let deleted_before = pos == end && old_size > 0 || pos > start && pos < end;
                let deleted_across = pos > start && pos < end;
                let deleted = if assoc < 0 {
                    pos != start && old_size > 0
                } else {
                    pos != end && old_size > 0
                };
                return MapResult {
                    pos: result,
                    deleted,
                    deleted_before,
                    deleted_after,
                    deleted_across,
                };
            }
            diff += new_size as isize - old_size as isize;
        }
        MapResult {
            pos: offset(pos, diff),
            deleted: false,
            deleted_before: false,
            deleted_after: false,
            deleted_across: false,
        }
    }

    pub fn for_each_range(&self, mut f: impl FnMut(usize, usize, usize, usize)) {
        let mut diff: isize = 0;
        for range in &self.ranges {
            let (old_size, new_size) = if self.inverted {
                (range.new_size, range.old_size)
            } else {
                (range.old_size, range.new_size)
            };
            let start = if self.inverted {
                offset(range.start, -diff)
            } else {
                range.start
            };
            let new_start = offset(start, diff);
            f(start, start + old_size, new_start, new_start + new_size);
            diff += new_size as isize - old_size as isize;
        }
    }
}

impl Mappable for StepMap {
    fn map(&self, pos: usize, assoc: i8) -> usize {
        StepMap::map(self, pos, assoc)
    }

    fn map_result(&self, pos: usize, assoc: i8) -> MapResult {
        StepMap::map_result(self, pos, assoc)
    }
}

fn offset(pos: usize, diff: isize) -> usize {
    pos.saturating_add_signed(diff)
}

/// A sequence of step maps, mapping positions through a whole transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mapping {
    maps: Vec<StepMap>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_maps(maps: Vec<StepMap>) -> Self {
        Self { maps }
    }

    pub fn maps(&self) -> &[StepMap] {
        &self.maps
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    pub fn append_map(&mut self, map: StepMap) {
        self.maps.push(map);
    }

    pub fn append_mapping(&mut self, other: &Mapping) {
        self.maps.extend(other.maps.iter().cloned());
    }

    /// The maps from index `from` onward.
    pub fn slice(&self, from: usize) -> Mapping {
        Mapping {
            maps: self.maps.get(from..).map(<[StepMap]>::to_vec).unwrap_or_default(),
        }
    }

    pub fn invert(&self) -> Mapping {
        Mapping {
            maps: self.maps.iter().rev().map(StepMap::invert).collect(),
        }
    }

    pub fn map(&self, pos: usize, assoc: i8) -> usize {
        self.maps.iter().fold(pos, |pos, map| map.map(pos, assoc))
    }

    pub fn map_result(&self, pos: usize, assoc: i8) -> MapResult {
        let mut result = MapResult {
            pos,
            deleted: false,
            deleted_before: false,
            deleted_after: false,
            deleted_across: false,
        };
        for map in &self.maps {
            let step = map.map_result(result.pos, assoc);
            result = MapResult {
                pos: step.pos,
                deleted: result.deleted || step.deleted,
                deleted_before: result.deleted_before || step.deleted_before,
                deleted_after: result.deleted_after || step.deleted_after,
                deleted_across: result.deleted_across || step.deleted_across,
            };
        }
        result
    }
}

impl Mappable for Mapping {
    fn map(&self, pos: usize, assoc: i8) -> usize {
        Mapping::map(self, pos, assoc)
    }

    fn map_result(&self, pos: usize, assoc: i8) -> MapResult {
        Mapping::map_result(self, pos, assoc)
    }
}
