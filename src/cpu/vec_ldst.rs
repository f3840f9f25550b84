// Vector load/store execution record
//
// One VecLdStInfo is filled in while a vector load or store executes and is
// read back by the memory consistency checker and the tracer after the
// instruction retires. It is cleared before the next vector load/store.

use std::fmt;

// ============================================================================
// Element record
// ============================================================================

/// One memory access made by one lane (and one field, for segment ops).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VecLdStElem {
    /// Virtual address of data
    pub va: u64,
    /// Physical address of data
    pub pa: u64,
    /// For page crossers: address on the 2nd page, otherwise same as `pa`
    pub pa2: u64,
    /// Load/store data, widened to 64 bits
    pub data: u64,
    /// Index of element in vector register group
    pub ix: u32,
    /// For segment load/store: field of element
    pub field: u32,
    /// Element is not active (masked off or tail)
    pub skip: bool,
}

impl VecLdStElem {
    pub fn new(va: u64, pa: u64, pa2: u64, data: u64, ix: u32, skip: bool) -> Self {
        Self::with_field(va, pa, pa2, data, ix, skip, 0)
    }

    pub fn with_field(
        va: u64,
        pa: u64,
        pa2: u64,
        data: u64,
        ix: u32,
        skip: bool,
        field: u32,
    ) -> Self {
        Self {
            va,
            pa,
            pa2,
            data,
            ix,
            field,
            skip,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.skip
    }

    /// True if the access spans two physical pages. Skipped elements carry
    /// placeholder addresses and never count.
    pub fn is_page_crosser(&self) -> bool {
        !self.skip && self.pa2 != self.pa
    }

    fn write_trace(&self, f: &mut fmt::Formatter<'_>, data_digits: usize) -> fmt::Result {
        write!(
            f,
            "ix={} field={} va={:#x} pa={:#x}",
            self.ix, self.field, self.va, self.pa
        )?;
        if self.is_page_crosser() {
            write!(f, ":{:#x}", self.pa2)?;
        }
        write!(f, " data=0x{:0width$x}", self.data, width = data_digits)?;
        if self.skip {
            f.write_str(" skip")?;
        }
        Ok(())
    }
}

impl fmt::Display for VecLdStElem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_trace(f, 1)
    }
}

/// Trace line for one element with data padded to the element width.
struct TraceLine<'a> {
    elem: &'a VecLdStElem,
    elem_size: u32,
}

impl fmt::Display for TraceLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = (self.elem_size as usize * 2).max(1);
        self.elem.write_trace(f, digits)
    }
}

// ============================================================================
// Operation record
// ============================================================================

/// Addressing mode of a vector load/store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AddrMode {
    /// Unit stride (also used for whole register and fault-only-first)
    #[default]
    Unit,
    /// Constant byte stride between consecutive elements
    Strided { stride: u64 },
    /// Per-element offsets taken from an index register group
    Indexed { ix_vec: u32, ix_group: u32 },
}

/// Field layout of segment and whole register load/store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldGroup {
    /// Fields per segment, or number of registers for whole register ops
    pub count: u32,
    /// True for a segment load/store, false for a whole register group
    pub segmented: bool,
}

/// Execution information of one vector load/store instruction. Used for
/// tracing and by the memory consistency model.
#[derive(Debug, Clone)]
pub struct VecLdStInfo {
    /// VL: elements with `ix >= elem_count` are tail elements
    pub elem_count: u32,
    /// Element size in bytes
    pub elem_size: u32,
    /// Base data vector register
    pub vec: u32,
    /// Group multiplier, or 1 if fractional
    pub group: u32,
    /// True for load instructions
    pub is_load: bool,
    /// Unit, strided or indexed addressing
    pub mode: AddrMode,
    /// Segment or whole register field layout, None otherwise
    pub fields: Option<FieldGroup>,
    elems: Vec<VecLdStElem>,
}

impl Default for VecLdStInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl VecLdStInfo {
    pub fn new() -> Self {
        Self {
            elem_count: 0,
            elem_size: 0,
            vec: 0,
            group: 0,
            is_load: false,
            mode: AddrMode::Unit,
            fields: None,
            elems: Vec::new(),
        }
    }

    /// Return true if no element was loaded/stored.
    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    pub fn len(&self) -> usize {
        self.elems.len()
    }

    /// Clear for reuse by the next instruction. Only the element size and the
    /// element list are reset; the rest is overwritten by the next `init*`.
    pub fn clear(&mut self) {
        self.elem_size = 0;
        self.elems.clear();
    }

    /// Configure a unit-stride access: element count (VL), element size in
    /// bytes, data vector register, group multiplier and direction. Values
    /// are taken as decoded; nothing is range checked.
    pub fn init(&mut self, elem_count: u32, elem_size: u32, vec: u32, group: u32, is_load: bool) {
        if !self.elems.is_empty() {
            log::debug!(
                "vldst: reconfigured with {} element(s) still recorded",
                self.elems.len()
            );
        }
        self.elem_count = elem_count;
        self.elem_size = elem_size;
        self.vec = vec;
        self.group = group;
        self.is_load = is_load;
        self.mode = AddrMode::Unit;
        self.fields = None;
        log::trace!(
            "vldst: {} vl={} size={} v{} m{}",
            if is_load { "load" } else { "store" },
            elem_count,
            elem_size,
            vec,
            group
        );
    }

    /// Like `init`, plus the index vector register and its group multiplier.
    #[allow(clippy::too_many_arguments)]
    pub fn init_indexed(
        &mut self,
        elem_count: u32,
        elem_size: u32,
        vec: u32,
        ix_vec: u32,
        group: u32,
        ix_group: u32,
        is_load: bool,
    ) {
        self.init(elem_count, elem_size, vec, group, is_load);
        self.mode = AddrMode::Indexed { ix_vec, ix_group };
    }

    /// Like `init`, plus the byte stride.
    pub fn init_strided(
        &mut self,
        elem_count: u32,
        elem_size: u32,
        vec: u32,
        group: u32,
        stride: u64,
        is_load: bool,
    ) {
        self.init(elem_count, elem_size, vec, group, is_load);
        self.mode = AddrMode::Strided { stride };
    }

    /// Set the field count. Used for segment load/store (`segmented` true)
    /// and whole register load/store (`segmented` false).
    pub fn set_field_count(&mut self, count: u32, segmented: bool) {
        self.fields = Some(FieldGroup { count, segmented });
    }

    pub fn add_elem(&mut self, elem: VecLdStElem) {
        self.elems.push(elem);
    }

    /// Set the physical addresses and data of the last added element.
    ///
    /// # Panics
    ///
    /// Panics if no element was added.
    pub fn set_last_elem(&mut self, pa: u64, pa2: u64, data: u64) {
        let Some(last) = self.elems.last_mut() else {
            panic!("vldst: set_last_elem on empty record");
        };
        last.pa = pa;
        last.pa2 = pa2;
        last.data = data;
    }

    /// Remove the last added element.
    ///
    /// # Panics
    ///
    /// Panics if no element was added.
    pub fn remove_last_elem(&mut self) {
        match self.elems.pop() {
            Some(e) => log::trace!("vldst: dropped ix={} field={}", e.ix, e.field),
            None => panic!("vldst: remove_last_elem on empty record"),
        }
    }

    /// Return true if all elements were skipped (mask or tail). True when empty.
    pub fn all_skipped(&self) -> bool {
        self.elems.iter().all(|e| e.skip)
    }

    pub fn is_indexed(&self) -> bool {
        matches!(self.mode, AddrMode::Indexed { .. })
    }

    pub fn is_strided(&self) -> bool {
        matches!(self.mode, AddrMode::Strided { .. })
    }

    pub fn is_segmented(&self) -> bool {
        self.fields.is_some_and(|f| f.segmented)
    }

    /// Fields per segment or registers per whole register op; 0 otherwise.
    pub fn field_count(&self) -> u32 {
        self.fields.map_or(0, |f| f.count)
    }

    pub fn stride(&self) -> u64 {
        match self.mode {
            AddrMode::Strided { stride } => stride,
            _ => 0,
        }
    }

    pub fn index_vec(&self) -> u32 {
        match self.mode {
            AddrMode::Indexed { ix_vec, .. } => ix_vec,
            _ => 0,
        }
    }

    pub fn index_group(&self) -> u32 {
        match self.mode {
            AddrMode::Indexed { ix_group, .. } => ix_group,
            _ => 0,
        }
    }

    /// True if lane `ix` is past VL.
    pub fn is_tail(&self, ix: u32) -> bool {
        ix >= self.elem_count
    }

    // ------------------------------------------------------------------------
    // Read side (consistency checker, tracer)
    // ------------------------------------------------------------------------

    /// Elements in the order they were added.
    pub fn elems(&self) -> &[VecLdStElem] {
        &self.elems
    }

    pub fn iter(&self) -> std::slice::Iter<'_, VecLdStElem> {
        self.elems.iter()
    }

    pub fn last_elem(&self) -> Option<&VecLdStElem> {
        self.elems.last()
    }

    pub fn active_elems(&self) -> impl Iterator<Item = &VecLdStElem> + '_ {
        self.elems.iter().filter(|e| !e.skip)
    }

    /// Elements belonging to segment field `field`, skipped ones included.
    pub fn field_elems(&self, field: u32) -> impl Iterator<Item = &VecLdStElem> + '_ {
        self.elems.iter().filter(move |e| e.field == field)
    }

    /// Active elements whose access spans two physical pages.
    pub fn page_crossers(&self) -> impl Iterator<Item = &VecLdStElem> + '_ {
        self.active_elems().filter(|e| e.is_page_crosser())
    }

    /// One trace line per active element. Empty when all elements were skipped.
    pub fn trace_lines(&self) -> impl Iterator<Item = String> + '_ {
        let elem_size = self.elem_size;
        self.active_elems()
            .map(move |elem| TraceLine { elem, elem_size }.to_string())
    }
}

impl<'a> IntoIterator for &'a VecLdStInfo {
    type Item = &'a VecLdStElem;
    type IntoIter = std::slice::Iter<'a, VecLdStElem>;

    fn into_iter(self) -> Self::IntoIter {
        self.elems.iter()
    }
}
