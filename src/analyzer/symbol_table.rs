use std::collections::HashMap;
use std::fmt;

use super::DataType;

/// Parameters start right above the saved frame pointer and return address.
pub const FIRST_PARAM_OFFSET: i64 = 16;
pub const PARAM_STRIDE: i64 = 8;

const SLOT_ALIGNMENT: i64 = 8;
const FRAME_ALIGNMENT: usize = 16;

/// Largest frame or single object in bytes. Frames are reserved with
/// `sub rsp, imm32` and globals are addressed with 32-bit displacements.
pub const MAX_STORAGE_SIZE: usize = i32::MAX as usize & !(FRAME_ALIGNMENT - 1);

pub fn align_to(n: usize, align: usize) -> usize {
    (n + align - 1) / align * align
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Parameter,
    Function { param_count: usize, defined: bool },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymbolEntry {
    pub name: String,
    pub data_type: DataType,
    pub kind: SymbolKind,
    /// `None` for globals.
    pub owner: Option<String>,
    /// Byte offset from `rbp`; unused for globals and functions.
    pub offset: i64,
    pub is_array: bool,
    /// `None` for scalars and for array parameters.
    pub array_size: Option<usize>,
    pub is_extern: bool,
}

impl SymbolEntry {
    pub fn is_global(&self) -> bool {
        self.owner.is_none()
    }

    pub fn is_function(&self) -> bool {
        matches!(self.kind, SymbolKind::Function { .. })
    }

    pub fn param_count(&self) -> Option<usize> {
        match self.kind {
            SymbolKind::Function { param_count, .. } => Some(param_count),
            _ => None,
        }
    }

    /// A function that was only prototyped: neither defined nor extern.
    pub fn is_undefined_function(&self) -> bool {
        matches!(self.kind, SymbolKind::Function { defined: false, .. }) && !self.is_extern
    }

    /// Bytes of storage: one element for scalars, `array_size` elements for arrays.
    /// `None` when the size overflows.
    pub fn storage_size(&self) -> Option<usize> {
        self.data_type
            .sizeof()
            .checked_mul(self.array_size.unwrap_or(1))
    }
}

/// Flat, append-only registry of every name declared in one compilation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SymbolTable {
    entries: Vec<SymbolEntry>,
    index: HashMap<String, usize>,
    current_offset: i64,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn format_name(owner: Option<&str>, name: &str) -> String {
        format!("{}::{}", owner.unwrap_or(""), name)
    }

    fn insert(&mut self, entry: SymbolEntry) -> bool {
        let key = Self::format_name(entry.owner.as_deref(), &entry.name);
        if self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key, self.entries.len());
        self.entries.push(entry);
        true
    }

    /// Registers a variable. Locals get the next slot below the frame base,
    /// aligned to 8 bytes; globals take no frame space.
    ///
    /// Also returns `false` when the object, or the frame it extends, would
    /// exceed [`MAX_STORAGE_SIZE`].
    pub fn insert_variable(
        &mut self,
        name: &str,
        data_type: DataType,
        array_size: Option<usize>,
        owner: Option<&str>,
    ) -> bool {
        let mut entry = SymbolEntry {
            name: name.to_string(),
            data_type,
            kind: SymbolKind::Variable,
            owner: owner.map(str::to_string),
            offset: 0,
            is_array: array_size.is_some(),
            array_size,
            is_extern: false,
        };
        let Some(size) = entry.storage_size().filter(|&s| s <= MAX_STORAGE_SIZE) else {
            return false;
        };
        if owner.is_some() {
            if self.lookup_in_scope(name, owner).is_some() {
                return false;
            }
            // Both terms are at most MAX_STORAGE_SIZE in magnitude.
            let below = self.current_offset - size as i64;
            let offset = below.div_euclid(SLOT_ALIGNMENT) * SLOT_ALIGNMENT;
            if offset.unsigned_abs() as usize > MAX_STORAGE_SIZE {
                return false;
            }
            self.current_offset = offset;
            entry.offset = offset;
        }
        self.insert(entry)
    }

    pub fn insert_extern_variable(
        &mut self,
        name: &str,
        data_type: DataType,
        array_size: Option<usize>,
    ) -> bool {
        self.insert(SymbolEntry {
            name: name.to_string(),
            data_type,
            kind: SymbolKind::Variable,
            owner: None,
            offset: 0,
            is_array: array_size.is_some(),
            array_size,
            is_extern: true,
        })
    }

    pub fn insert_function(
        &mut self,
        name: &str,
        return_type: DataType,
        param_count: usize,
        defined: bool,
        is_extern: bool,
    ) -> bool {
        self.insert(SymbolEntry {
            name: name.to_string(),
            data_type: return_type,
            kind: SymbolKind::Function {
                param_count,
                defined,
            },
            owner: None,
            offset: 0,
            is_array: false,
            array_size: None,
            is_extern,
        })
    }

    /// Records a parameter at a caller-chosen offset above the frame base.
    /// Array parameters have no known size.
    pub fn insert_parameter(
        &mut self,
        name: &str,
        data_type: DataType,
        offset: i64,
        is_array: bool,
        owner: &str,
    ) -> bool {
        self.insert(SymbolEntry {
            name: name.to_string(),
            data_type,
            kind: SymbolKind::Parameter,
            owner: Some(owner.to_string()),
            offset,
            is_array,
            array_size: None,
            is_extern: false,
        })
    }

    /// Flags a previously declared function as having a body.
    pub fn mark_defined(&mut self, name: &str) {
        let key = Self::format_name(None, name);
        if let Some(&i) = self.index.get(&key) {
            if let SymbolKind::Function { defined, .. } = &mut self.entries[i].kind {
                *defined = true;
            }
        }
    }

    /// Exact-scope query, no fallback to globals.
    pub fn lookup_in_scope(&self, name: &str, owner: Option<&str>) -> Option<&SymbolEntry> {
        self.index
            .get(&Self::format_name(owner, name))
            .map(|&i| &self.entries[i])
    }

    /// Resolves `name` from inside `current_function`: locals and parameters
    /// shadow globals of the same name.
    pub fn lookup(&self, name: &str, current_function: Option<&str>) -> Option<&SymbolEntry> {
        current_function
            .and_then(|f| self.lookup_in_scope(name, Some(f)))
            .or_else(|| self.lookup_in_scope(name, None))
    }

    pub fn reset_frame(&mut self) {
        self.current_offset = 0;
    }

    pub fn current_offset(&self) -> i64 {
        self.current_offset
    }

    /// Bytes to reserve below `rbp` for the locals of `function`, rounded up to 16.
    pub fn frame_size(&self, function: &str) -> usize {
        let min_offset = self
            .entries
            .iter()
            .filter(|e| e.kind == SymbolKind::Variable && e.owner.as_deref() == Some(function))
            .map(|e| e.offset)
            .min()
            .unwrap_or(0);
        align_to(min_offset.unsigned_abs() as usize, FRAME_ALIGNMENT)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SymbolEntry> {
        self.entries.iter()
    }

    /// Global variables that need storage in this translation unit.
    pub fn global_variables(&self) -> impl Iterator<Item = &SymbolEntry> {
        self.entries
            .iter()
            .filter(|e| e.is_global() && e.kind == SymbolKind::Variable && !e.is_extern)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for SymbolTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "{:<16} | {:<4} | {:<9} | {:<16} | {:>8} | {:<5} | {:>4}",
            "Name", "Type", "Kind", "Scope", "Offset", "Array", "Size"
        )?;
        writeln!(
            f,
            "{:-<16}-|-{:-<4}-|-{:-<9}-|-{:-<16}-|-{:->8}-|-{:-<5}-|-{:->4}",
            "", "", "", "", "", "", ""
        )?;
        for e in &self.entries {
            let kind = match e.kind {
                SymbolKind::Variable if e.is_extern => "extern",
                SymbolKind::Variable => "variable",
                SymbolKind::Parameter => "parameter",
                SymbolKind::Function { .. } => "function",
            };
            let offset = match e.kind {
                SymbolKind::Function { param_count, .. } => format!("{} args", param_count),
                _ if e.is_global() => "-".to_string(),
                _ => e.offset.to_string(),
            };
            let size = match e.array_size {
                Some(size) => size.to_string(),
                None if e.is_array => "?".to_string(),
                None => "-".to_string(),
            };
            writeln!(
                f,
                "{:<16} | {:<4} | {:<9} | {:<16} | {:>8} | {:<5} | {:>4}",
                e.name,
                e.data_type.to_string(),
                kind,
                e.owner.as_deref().unwrap_or("<global>"),
                offset,
                if e.is_array { "yes" } else { "no" },
                size,
            )?;
        }
        Ok(())
    }
}
