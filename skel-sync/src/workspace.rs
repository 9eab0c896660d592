//! The host workspace capability surface.
//!
//! Everything the engine reads from or writes to the disassembly database
//! goes through [`Workspace`]. A host adapter implements it over the real
//! database; [`MemoryWorkspace`] is a self-contained implementation that
//! serializes to JSON and backs the CLI and the tests.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use skel_core::{Address, InputFile};

use crate::error::{io_err, SyncError};

/// Answers a yes/no question put to the analyst.
pub type Confirmer = Box<dyn FnMut(&str) -> bool + Send>;

pub trait Workspace {
    fn comment(&self, address: Address) -> Option<String>;
    fn repeatable_comment(&self, address: Address) -> Option<String>;
    fn set_comment(&mut self, address: Address, text: &str, repeatable: bool) -> bool;

    /// Comment attached to the function containing `address`.
    fn function_comment(&self, address: Address, repeatable: bool) -> Option<String>;
    fn set_function_comment(&mut self, address: Address, text: &str, repeatable: bool) -> bool;

    fn name(&self, address: Address) -> Option<String>;
    fn set_name(&mut self, address: Address, name: &str) -> bool;

    fn type_string(&self, address: Address) -> Option<String>;
    fn set_type_string(&mut self, address: Address, type_string: &str) -> bool;

    /// Every address that carries a user-visible name, in address order.
    fn names(&self) -> Vec<(Address, String)>;
    /// Every address that carries any annotation, in address order.
    fn heads(&self) -> Vec<Address>;
    /// Inclusive bounds of the loaded program.
    fn address_range(&self) -> (Address, Address);

    fn input_file(&self) -> Option<InputFile>;

    fn create_struct(&mut self, name: &str) -> u64;
    fn rename_struct(&mut self, id: u64, name: &str) -> bool;
    fn delete_struct(&mut self, id: u64) -> bool;
    fn add_struct_member(&mut self, id: u64, member: StructMember) -> bool;

    /// Ask the analyst; `false` means "no".
    fn confirm(&mut self, question: &str) -> bool;

    fn contains(&self, address: Address) -> bool {
        let (min, max) = self.address_range();
        min <= address && address <= max
    }
}

// ---------------------------------------------------------------------------
// In-memory workspace
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructMember {
    pub name: String,
    pub offset: u64,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalStruct {
    pub name: String,
    #[serde(default)]
    pub members: Vec<StructMember>,
}

/// A JSON-persistable workspace.
///
/// Prompts are answered by the installed [`Confirmer`]; without one every
/// question is declined. `prompts` records each question asked and
/// `writes` counts successful mutations.
#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryWorkspace {
    pub input: Option<InputFile>,
    pub min_address: Address,
    pub max_address: Address,
    pub names: BTreeMap<Address, String>,
    pub comments: BTreeMap<Address, String>,
    pub repeatable_comments: BTreeMap<Address, String>,
    pub function_comments: BTreeMap<Address, String>,
    pub repeatable_function_comments: BTreeMap<Address, String>,
    pub types: BTreeMap<Address, String>,
    pub structs: BTreeMap<u64, LocalStruct>,
    #[serde(skip)]
    confirmer: Option<Confirmer>,
    #[serde(skip)]
    prompts: Vec<String>,
    #[serde(skip)]
    writes: usize,
}

impl fmt::Debug for MemoryWorkspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryWorkspace")
            .field("input", &self.input)
            .field("names", &self.names.len())
            .field("comments", &self.comments.len())
            .field("repeatable_comments", &self.repeatable_comments.len())
            .field("types", &self.types.len())
            .field("structs", &self.structs.len())
            .field("writes", &self.writes)
            .finish()
    }
}

impl Default for MemoryWorkspace {
    fn default() -> Self {
        Self {
            input: None,
            min_address: Address(0),
            max_address: Address(u64::MAX),
            names: BTreeMap::new(),
            comments: BTreeMap::new(),
            repeatable_comments: BTreeMap::new(),
            function_comments: BTreeMap::new(),
            repeatable_function_comments: BTreeMap::new(),
            types: BTreeMap::new(),
            structs: BTreeMap::new(),
            confirmer: None,
            prompts: Vec::new(),
            writes: 0,
        }
    }
}

impl MemoryWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(mut self, input: InputFile) -> Self {
        self.input = Some(input);
        self
    }

    pub fn with_range(mut self, min: Address, max: Address) -> Self {
        self.min_address = min;
        self.max_address = max;
        self
    }

    pub fn set_confirmer(&mut self, confirmer: Confirmer) {
        self.confirmer = Some(confirmer);
    }

    /// Answer every prompt with `answer`.
    pub fn answer_all(&mut self, answer: bool) {
        self.confirmer = Some(Box::new(move |_| answer));
    }

    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn load(path: &Path) -> Result<Self, SyncError> {
        let raw = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        serde_json::from_str(&raw).map_err(|source| SyncError::Workspace {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Atomic write: `<path>.tmp` then rename.
    pub fn save(&self, path: &Path) -> Result<(), SyncError> {
        let json = serde_json::to_string_pretty(self).map_err(|source| SyncError::Workspace {
            path: path.to_path_buf(),
            source,
        })?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
        std::fs::rename(&tmp, path).map_err(|e| io_err(path, e))?;
        Ok(())
    }

    /// Address of the function holding `address`: the closest named address
    /// at or below it.
    fn function_start(&self, address: Address) -> Option<Address> {
        self.names.range(..=address).next_back().map(|(a, _)| *a)
    }

    fn put(map: &mut BTreeMap<Address, String>, address: Address, value: &str) -> bool {
        if value.is_empty() {
            map.remove(&address).is_some()
        } else {
            map.insert(address, value.to_string());
            true
        }
    }

    fn record_write(&mut self, changed: bool) -> bool {
        if changed {
            self.writes += 1;
        }
        changed
    }
}

impl Workspace for MemoryWorkspace {
    fn comment(&self, address: Address) -> Option<String> {
        self.comments.get(&address).cloned()
    }

    fn repeatable_comment(&self, address: Address) -> Option<String> {
        self.repeatable_comments.get(&address).cloned()
    }

    fn set_comment(&mut self, address: Address, text: &str, repeatable: bool) -> bool {
        let map = if repeatable {
            &mut self.repeatable_comments
        } else {
            &mut self.comments
        };
        let changed = Self::put(map, address, text);
        self.record_write(changed)
    }

    fn function_comment(&self, address: Address, repeatable: bool) -> Option<String> {
        let start = self.function_start(address)?;
        let map = if repeatable {
            &self.repeatable_function_comments
        } else {
            &self.function_comments
        };
        map.get(&start).cloned()
    }

    fn set_function_comment(&mut self, address: Address, text: &str, repeatable: bool) -> bool {
        let Some(start) = self.function_start(address) else {
            return false;
        };
        let map = if repeatable {
            &mut self.repeatable_function_comments
        } else {
            &mut self.function_comments
        };
        let changed = Self::put(map, start, text);
        self.record_write(changed)
    }

    fn name(&self, address: Address) -> Option<String> {
        self.names.get(&address).cloned()
    }

    fn set_name(&mut self, address: Address, name: &str) -> bool {
        if !self.contains(address) {
            return false;
        }
        let changed = Self::put(&mut self.names, address, name);
        self.record_write(changed)
    }

    fn type_string(&self, address: Address) -> Option<String> {
        self.types.get(&address).cloned()
    }

    fn set_type_string(&mut self, address: Address, type_string: &str) -> bool {
        let changed = Self::put(&mut self.types, address, type_string);
        self.record_write(changed)
    }

    fn names(&self) -> Vec<(Address, String)> {
        self.names.iter().map(|(a, n)| (*a, n.clone())).collect()
    }

    fn heads(&self) -> Vec<Address> {
        let mut heads: Vec<Address> = self
            .names
            .keys()
            .chain(self.comments.keys())
            .chain(self.repeatable_comments.keys())
            .chain(self.types.keys())
            .copied()
            .collect();
        heads.sort_unstable();
        heads.dedup();
        heads
    }

    fn address_range(&self) -> (Address, Address) {
        (self.min_address, self.max_address)
    }

    fn input_file(&self) -> Option<InputFile> {
        self.input.clone()
    }

    fn create_struct(&mut self, name: &str) -> u64 {
        let id = self.structs.keys().next_back().map_or(1, |last| last + 1);
        self.structs.insert(
            id,
            LocalStruct {
                name: name.to_string(),
                members: Vec::new(),
            },
        );
        self.writes += 1;
        id
    }

    fn rename_struct(&mut self, id: u64, name: &str) -> bool {
        let changed = match self.structs.get_mut(&id) {
            Some(s) => {
                s.name = name.to_string();
                true
            }
            None => false,
        };
        self.record_write(changed)
    }

    fn delete_struct(&mut self, id: u64) -> bool {
        let changed = self.structs.remove(&id).is_some();
        self.record_write(changed)
    }

    fn add_struct_member(&mut self, id: u64, member: StructMember) -> bool {
        let changed = match self.structs.get_mut(&id) {
            Some(s) => {
                s.members.push(member);
                true
            }
            None => false,
        };
        self.record_write(changed)
    }

    fn confirm(&mut self, question: &str) -> bool {
        self.prompts.push(question.to_string());
        match self.confirmer.as_mut() {
            Some(answer) => answer(question),
            None => false,
        }
    }
}
